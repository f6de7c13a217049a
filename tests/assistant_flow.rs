use fleetiq::access::CallerContext;
use fleetiq::assistant::{Assistant, ChatRequest, GenerateSqlRequest};
use fleetiq::config::AssistantConfig;
use fleetiq::db::Database;
use std::time::Duration;

/// Fresh file-backed SQLite database with the fleet fixture loaded.
/// No language-model credentials are configured, so these tests exercise the
/// interceptor paths and the deterministic fallbacks end to end.
async fn fixture_db() -> Database {
    let path = std::env::temp_dir().join(format!("fleetiq_flow_{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = Database::connect(&url).await.expect("connect test db");

    db.execute_raw(
        "CREATE TABLE dim_vehicle (\
         vehicle_id TEXT PRIMARY KEY, customer_id TEXT, registration_number TEXT, \
         make_name TEXT, model_name TEXT, model_year INTEGER, fuel_type TEXT, \
         vehicle_status TEXT, book_value REAL, purchase_price REAL, is_active INTEGER)",
    )
    .await
    .unwrap();
    for row in [
        "('V1','C100','AB-101','Toyota','Corolla',2022,'Petrol','Active',15000.0,24000.0,1)",
        "('V2','C100','AB-102','Toyota','Yaris',2023,'Hybrid','Active',17000.0,22000.0,1)",
        "('V3','C200','CD-201','Ford','Focus',2021,'Diesel','Active',12000.0,26000.0,1)",
        "('V4','C200','CD-202','Ford','Fiesta',2019,'Petrol','Terminated',6000.0,18000.0,0)",
        "('V5','C200','CD-203','Volvo','XC40',2020,'Electric','Terminated',21000.0,42000.0,0)",
    ] {
        db.execute_raw(&format!("INSERT INTO dim_vehicle VALUES {}", row))
            .await
            .unwrap();
    }

    db.execute_raw(
        "CREATE TABLE dim_contract (\
         contract_id TEXT PRIMARY KEY, contract_number TEXT, customer_id TEXT, \
         vehicle_id TEXT, customer_name TEXT, lease_type TEXT, start_date TEXT, \
         expected_end_date TEXT, months_remaining INTEGER, monthly_rental REAL, \
         is_active INTEGER)",
    )
    .await
    .unwrap();
    for row in [
        "('K1','CT-1001','C100','V1','Acme Logistics','FL','2023-01-01','2026-10-01',2,520.0,1)",
        "('K2','CT-1002','C100','V2','Acme Logistics','FL','2023-06-01','2027-06-01',10,480.0,1)",
        "('K3','CT-2001','C200','V3','Globex NV','NL','2022-03-01','2026-09-15',1,610.0,1)",
    ] {
        db.execute_raw(&format!("INSERT INTO dim_contract VALUES {}", row))
            .await
            .unwrap();
    }

    db.execute_raw(
        "CREATE TABLE fact_maintenance (\
         event_id TEXT PRIMARY KEY, vehicle_id TEXT, customer_id TEXT, \
         service_date TEXT, service_type TEXT, service_cost REAL, odometer_km INTEGER)",
    )
    .await
    .unwrap();
    for row in [
        "('M1','V1','C100','2026-05-02','Service',210.0,41000)",
        "('M2','V1','C100','2026-07-15','Tyres',480.0,46000)",
        "('M3','V3','C200','2026-06-20','Brakes',350.0,62000)",
    ] {
        db.execute_raw(&format!("INSERT INTO fact_maintenance VALUES {}", row))
            .await
            .unwrap();
    }

    db
}

async fn assistant() -> Assistant {
    Assistant::new(fixture_db().await, AssistantConfig::default())
        .await
        .expect("build assistant")
}

fn admin() -> CallerContext {
    CallerContext::new("admin", "fleet_admin", 50, None)
}

fn analyst_for(customer: &str) -> CallerContext {
    CallerContext::new("analyst", "analyst", 10, Some(vec![customer.to_string()]))
}

#[tokio::test]
async fn vehicles_by_status_round_trip() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "vehicles by status".to_string(),
            caller: admin(),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(
        result.sql.as_deref(),
        Some(
            "SELECT vehicle_status, COUNT(*) AS vehicles_count FROM dim_vehicle \
             GROUP BY vehicle_status ORDER BY vehicles_count DESC"
        )
    );
    assert!(result.is_safe);
    let rows = result.rows.expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["vehicle_status"], "Active");
    assert_eq!(rows[0]["vehicles_count"], 3);
    assert_eq!(rows[1]["vehicle_status"], "Terminated");
    assert_eq!(rows[1]["vehicles_count"], 2);
}

#[tokio::test]
async fn registration_expiry_is_answered_directly() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "registration expiry next month".to_string(),
            caller: admin(),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert!(result.sql.is_none());
    assert!(result.explanation.contains("contract"));
    assert_eq!(result.suggestions.len(), 3);
    assert!(result.rows.is_none());
}

#[tokio::test]
async fn registration_interceptor_wins_over_aggregation() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "registration expiry for vehicles by status".to_string(),
            caller: admin(),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();
    // first-match-wins: the direct answer, not the GROUP BY
    assert!(result.sql.is_none());
}

#[tokio::test]
async fn restricted_caller_only_counts_their_vehicles() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "vehicles by status".to_string(),
            caller: analyst_for("C100"),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();

    let rows = result.rows.expect("rows");
    // C100 owns two Active vehicles and nothing else
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["vehicle_status"], "Active");
    assert_eq!(rows[0]["vehicles_count"], 2);
}

#[tokio::test]
async fn no_access_caller_gets_zero_rows() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "vehicles by status".to_string(),
            caller: CallerContext::new("intern", "intern", 10, Some(vec![])),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(result.row_count, Some(0));
    assert_eq!(result.rows.map(|r| r.len()), Some(0));
}

#[tokio::test]
async fn explanation_only_request_does_not_execute() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "count of vehicles by manufacturer".to_string(),
            caller: admin(),
            execute: false,
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert!(result.sql.is_some());
    assert!(result.rows.is_none());
    assert!(result.row_count.is_none());
}

#[tokio::test]
async fn unmatched_question_without_model_reports_not_configured() {
    let assistant = assistant().await;
    let result = assistant
        .generate_sql(GenerateSqlRequest {
            question: "what is the average monthly rental in Belgium?".to_string(),
            caller: admin(),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert!(result.sql.is_none());
    assert!(result.explanation.contains("not configured"));
}

#[tokio::test]
async fn chat_aggregation_returns_data_and_chart() {
    let assistant = assistant().await;
    let response = assistant
        .chat(ChatRequest {
            message: "vehicles by status".to_string(),
            caller: admin(),
            history: Vec::new(),
        })
        .await
        .unwrap();

    // two categories, one measure: pie chart
    let chart = response.chart.expect("chart suggestion");
    assert_eq!(chart.chart_type, "pie");
    assert_eq!(chart.x_axis_key, "vehicle_status");
    let data = response.data.expect("data payload");
    assert_eq!(data.as_array().unwrap().len(), 2);
    assert!(response.source_sql.is_some());
    // deterministic fallback answer carries the real numbers
    assert!(response.message.contains("Active"));
    assert!(response.message.contains('3'));
}

#[tokio::test]
async fn chat_contract_expiry_insight_uses_expected_end_date() {
    let assistant = assistant().await;
    let response = assistant
        .chat(ChatRequest {
            message: "which contracts are expiring soon?".to_string(),
            caller: admin(),
            history: Vec::new(),
        })
        .await
        .unwrap();

    let sql = response.source_sql.expect("insight sql");
    assert!(sql.contains("expected_end_date"));
    assert!(!sql.contains("lease_end_date"));
    let data = response.data.expect("data payload");
    // CT-1001 (2 months) and CT-2001 (1 month), soonest first
    let rows = data.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["contract_number"], "CT-2001");
    assert_eq!(rows[1]["contract_number"], "CT-1001");
}

#[tokio::test]
async fn chat_maintenance_insight_respects_rls() {
    let assistant = assistant().await;
    let response = assistant
        .chat(ChatRequest {
            message: "give me a maintenance summary".to_string(),
            caller: analyst_for("C100"),
            history: Vec::new(),
        })
        .await
        .unwrap();

    let data = response.data.expect("data payload");
    let rows = data.as_array().unwrap();
    // only C100's Toyota events are visible (210 + 480)
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["make_name"], "Toyota");
    assert_eq!(rows[0]["total_cost"], 690.0);
}

#[tokio::test]
async fn failed_insight_retrieval_admits_the_failure() {
    // No fact_maintenance relation, so the insight query cannot run.
    let path = std::env::temp_dir().join(format!("fleetiq_flow_{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = Database::connect(&url).await.unwrap();
    let assistant = Assistant::new(db, AssistantConfig::default()).await.unwrap();

    let response = assistant
        .chat(ChatRequest {
            message: "give me a maintenance summary".to_string(),
            caller: admin(),
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert!(response.message.contains("unable to retrieve the data"));
    assert!(response.data.is_none());
    assert!(response.chart.is_none());
}

#[tokio::test]
async fn every_generation_request_leaves_an_audit_record() {
    let db = fixture_db().await;
    let assistant = Assistant::new(db.clone(), AssistantConfig::default())
        .await
        .unwrap();

    assistant
        .generate_sql(GenerateSqlRequest {
            question: "vehicles by status".to_string(),
            caller: admin(),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();
    assistant
        .generate_sql(GenerateSqlRequest {
            question: "registration expiry next month".to_string(),
            caller: admin(),
            execute: true,
            history: Vec::new(),
        })
        .await
        .unwrap();

    // audit writes are detached from the response; poll briefly
    let mut audited = 0;
    for _ in 0..40 {
        let rows = db
            .fetch_rows("SELECT question, executed FROM ai_query_audit", 100)
            .await
            .unwrap();
        audited = rows.row_count();
        if audited == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(audited, 2);

    let rows = db
        .fetch_rows(
            "SELECT executed FROM ai_query_audit WHERE question = 'vehicles by status'",
            10,
        )
        .await
        .unwrap();
    assert_eq!(rows.rows[0][0], serde_json::Value::Number(1.into()));
}
