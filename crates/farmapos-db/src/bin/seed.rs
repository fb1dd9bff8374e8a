//! # Seed Data Generator
//!
//! Populates the database with demo catalog, promotion, stock, and wallet
//! data for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p farmapos-db --bin seed
//!
//! # Specify database path
//! cargo run -p farmapos-db --bin seed -- --db ./data/farmapos.db
//! ```
//!
//! ## Generated Data
//! - A handful of pharmacy products across categories, including the
//!   excluded ones (Recargas, Servicio Médico)
//! - Day-of-week, seasonal, quantity, and senior promotion rules
//! - Stock for the demo pharmacy
//! - One demo customer wallet with a small funded balance

use chrono::Utc;
use std::env;
use uuid::Uuid;

use farmapos_core::{Money, WalletMotive};
use farmapos_db::{Database, DbConfig};

const PHARMACY_ID: &str = "farmacia-01";
const DEMO_CUSTOMER: &str = "cliente-demo";

/// (name, category, price_cents, senior_eligible)
const PRODUCTS: &[(&str, &str, i64, bool)] = &[
    ("Paracetamol 500mg 10 tab", "farmacia", 4500, true),
    ("Ibuprofeno 400mg 10 tab", "farmacia", 6200, true),
    ("Omeprazol 20mg 14 cap", "farmacia", 8900, true),
    ("Suero oral 625ml", "farmacia", 1850, false),
    ("Shampoo caspa 400ml", "perfumeria", 9900, false),
    ("Crema corporal 200ml", "perfumeria", 7400, false),
    ("Galletas surtidas 500g", "abarrotes", 3200, false),
    ("Recarga Telcel $100", "recargas", 10000, false),
    ("Consulta médica", "servicio_medico", 5000, false),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = parse_db_path().unwrap_or_else(|| "./farmapos.db".to_string());
    println!("Seeding database at {db_path}");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let now = Utc::now();

    let mut product_ids = Vec::new();
    for (name, category, price_cents, senior) in PRODUCTS {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO products (id, pharmacy_id, name, category, base_price_cents,
                                  senior_eligible, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(PHARMACY_ID)
        .bind(name)
        .bind(category)
        .bind(price_cents)
        .bind(senior)
        .bind(now)
        .execute(db.pool())
        .await?;

        db.inventory().set_stock(PHARMACY_ID, &id, 50).await?;
        product_ids.push(id);
    }

    // Tuesday 10% on paracetamol, wallet-eligible
    seed_rule(
        &db,
        &product_ids[0],
        "INSERT INTO promotion_rules (id, product_id, rule_type, day, rate_bps, starts_on, ends_on, wallet_eligible)
         VALUES (?1, ?2, 'day_of_week', 'tuesday', 1000, '2026-01-01', '2026-12-31', 1)",
    )
    .await?;

    // Seasonal 15% on ibuprofeno, wallet-eligible
    seed_rule(
        &db,
        &product_ids[1],
        "INSERT INTO promotion_rules (id, product_id, rule_type, rate_bps, starts_on, ends_on, wallet_eligible)
         VALUES (?1, ?2, 'seasonal', 1500, '2026-01-01', '2026-12-31', 1)",
    )
    .await?;

    // 3x2 on suero oral
    seed_rule(
        &db,
        &product_ids[3],
        "INSERT INTO promotion_rules (id, product_id, rule_type, required_count, starts_on, ends_on)
         VALUES (?1, ?2, 'quantity', 3, '2026-01-01', '2026-12-31')",
    )
    .await?;

    // Fund the demo wallet
    db.wallet()
        .credit(
            DEMO_CUSTOMER,
            Money::from_cents(5000),
            WalletMotive::SaleAccrual,
            PHARMACY_ID,
            None,
        )
        .await?;

    println!(
        "Seeded {} products, 3 promotion rules, wallet for '{}' at $50.00",
        PRODUCTS.len(),
        DEMO_CUSTOMER
    );

    db.close().await;
    Ok(())
}

async fn seed_rule(db: &Database, product_id: &str, sql: &str) -> Result<(), farmapos_db::DbError> {
    sqlx::query(sql)
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .execute(db.pool())
        .await?;
    Ok(())
}

/// Parses `--db <path>` from the command line.
fn parse_db_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter().position(|a| a == "--db").and_then(|i| args.get(i + 1).cloned())
}
