use anyhow::Result;
use clap::{Parser, Subcommand};
use fleetiq::access::CallerContext;
use fleetiq::assistant::{Assistant, ChatRequest, GenerateSqlRequest};
use fleetiq::config::AssistantConfig;
use fleetiq::db::Database;
use tracing::info;

#[derive(Parser)]
#[command(name = "fleetiq")]
#[command(about = "Ask natural-language questions against a fleet reporting database")]
struct Args {
    /// Database URL (or set DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Caller role level; 50 and above sees all customers
    #[arg(long, default_value_t = 50)]
    role_level: i32,

    /// Customer IDs the caller may see (repeatable). Omit for unrestricted.
    #[arg(long = "customer-id")]
    customer_ids: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat: full answer with data and chart suggestion
    Ask { question: String },
    /// Generate SQL only; add --execute to also run it
    Sql {
        question: String,
        #[arg(long)]
        execute: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("set DATABASE_URL or pass --database-url"))?;

    let db = Database::connect(&database_url).await?;
    info!("Connected ({:?} dialect)", db.dialect());
    let assistant = Assistant::new(db, AssistantConfig::from_env()).await?;

    let customer_ids = if args.customer_ids.is_empty() {
        None
    } else {
        Some(args.customer_ids)
    };
    let caller = CallerContext::new("cli", "cli", args.role_level, customer_ids);

    match args.command {
        Command::Ask { question } => {
            let response = assistant
                .chat(ChatRequest {
                    message: question,
                    caller,
                    history: Vec::new(),
                })
                .await?;
            println!("{}", response.message);
            if let Some(chart) = response.chart {
                println!("\nchart suggestion: {}", serde_json::to_string_pretty(&chart)?);
            }
            for suggestion in response.suggestions {
                println!("  try: {}", suggestion);
            }
        }
        Command::Sql { question, execute } => {
            let result = assistant
                .generate_sql(GenerateSqlRequest {
                    question,
                    caller,
                    execute,
                    history: Vec::new(),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
