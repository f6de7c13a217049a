//! Compiled-in fallback for environments where the semantic catalog
//! tables have not been provisioned yet.

/// Hand-authored business rules injected into every SQL prompt, whether the
/// catalog is provisioned or not. These encode fleet-domain conventions the
/// language model reliably gets wrong without guidance.
pub const BUSINESS_RULES: &str = r#"BUSINESS RULES AND CODE TABLES:

Vehicle status codes (dim_vehicle.vehicle_status):
  Active      - on the road under a live contract
  Terminated  - contract ended, vehicle returned
  In Stock    - owned, awaiting allocation
  Sold        - disposed of

Lease type codes (dim_contract.lease_type):
  FL - Full operational lease (maintenance included)
  NL - Net lease (finance only)
  ST - Short-term rental

Fuel code groupings (dim_vehicle.fuel_type):
  Petrol, Diesel            -> combustion
  Hybrid, Plug-in Hybrid    -> hybrid
  Electric                  -> electric

Date conventions:
  - "this month" / "next month" are calendar months, not rolling 30-day windows.
  - Contract durations are whole months; pro-rata days are ignored.

Contract expiry:
  - Questions about contracts or leases "expiring" or "ending" MUST use
    dim_contract.expected_end_date and dim_contract.months_remaining.
  - NEVER use lease_end_date: it is a stale raw field from the source system
    and is not maintained after contract amendments."#;

/// Static SQL-prompt domain block used when the catalog relations are empty.
pub const STATIC_SQL_DOMAIN_BLOCK: &str = r#"TABLES:

dim_vehicle - one row per fleet vehicle
  vehicle_id (KEY), customer_id (KEY), registration_number, make_name,
  model_name, model_year, fuel_type, vehicle_status, book_value (MEASURE),
  purchase_price (MEASURE), is_active

dim_contract - one row per lease contract
  contract_id (KEY), contract_number, customer_id (KEY), vehicle_id (KEY),
  customer_name, lease_type, start_date, expected_end_date, months_remaining,
  monthly_rental (MEASURE), is_active

fact_maintenance - one row per maintenance or service event
  event_id (KEY), vehicle_id (KEY), customer_id (KEY), service_date,
  service_type, service_cost (MEASURE), odometer_km

RELATIONSHIPS:
  dim_contract.vehicle_id -> dim_vehicle.vehicle_id (many-to-one)
  fact_maintenance.vehicle_id -> dim_vehicle.vehicle_id (many-to-one)"#;

/// Static chat-prompt context used when the glossary is empty.
pub const STATIC_CHAT_DOMAIN_BLOCK: &str = r#"GLOSSARY:
  Book value - current depreciated asset value of a vehicle
  Months remaining - whole months until a contract's expected end date
  Full operational lease (FL) - lease including maintenance and tyres

The reporting database covers fleet vehicles, lease contracts, and
maintenance events for multiple customers."#;
