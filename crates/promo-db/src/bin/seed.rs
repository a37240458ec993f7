//! # Seed Data Generator
//!
//! Populates the database with promotion rules and coupons for development.
//!
//! ## Usage
//! ```bash
//! # 20 rules with 3 coupons each (default)
//! cargo run -p promo-db --bin seed
//!
//! # Custom amounts
//! cargo run -p promo-db --bin seed -- --rules 100 --coupons 5
//!
//! # Specify database path (overrides config file and PROMO_DB_PATH)
//! cargo run -p promo-db --bin seed -- --db ./data/promo.db
//! ```
//!
//! ## Generated Data
//! Each rule gets a name from [`CAMPAIGNS`], limits cycled from [`LIMITS`],
//! and `--coupons` coupon codes of the form `{PREFIX}-{8 hex chars}`. The
//! first coupon of every rule is its primary code.

use std::env;
use std::path::PathBuf;

use promo_core::{Coupon, Rule};
use promo_db::{Database, LedgerConfig};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Campaign names and their coupon prefixes.
const CAMPAIGNS: &[(&str, &str)] = &[
    ("Spring Sale", "SPRING"),
    ("Summer Clearance", "SUMMER"),
    ("Back to School", "SCHOOL"),
    ("Black Friday", "BLACKFRI"),
    ("Cyber Monday", "CYBER"),
    ("Holiday Bundle", "HOLIDAY"),
    ("New Customer Welcome", "WELCOME"),
    ("Loyalty Reward", "LOYAL"),
    ("Free Shipping", "SHIPFREE"),
    ("Flash Deal", "FLASH"),
];

/// (uses_per_coupon, uses_per_customer, usage_limit, usage_per_customer).
/// Zero is unlimited.
const LIMITS: &[(i64, i64, i64, i64)] = &[
    (0, 0, 0, 0),
    (100, 1, 0, 1),
    (500, 0, 50, 0),
    (0, 3, 10, 2),
    (1000, 5, 0, 0),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,promo=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_help() {
    println!("Promo Ledger Seed Data Generator");
    println!();
    println!("Usage: seed [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -r, --rules <N>      Number of rules to generate (default: 20)");
    println!("  -n, --coupons <N>    Coupons per rule (default: 3)");
    println!("  -d, --db <PATH>      Database file path (default: from config)");
    println!("      --config <PATH>  Config file (default: platform config dir)");
    println!("  -h, --help           Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut rule_count: usize = 20;
    let mut coupons_per_rule: usize = 3;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--rules" | "-r", Some(v)) => {
                rule_count = v.parse()?;
                i += 1;
            }
            ("--coupons" | "-n", Some(v)) => {
                coupons_per_rule = v.parse()?;
                i += 1;
            }
            ("--db" | "-d", Some(v)) => {
                db_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--config", Some(v)) => {
                config_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--help" | "-h", _) => {
                print_help();
                return Ok(());
            }
            (other, _) => {
                eprintln!("Ignoring unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Promo Ledger Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!("Rules:    {}", rule_count);
    println!("Coupons:  {} per rule", coupons_per_rule);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.rules().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} rules", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut coupons_generated = 0;

    for index in 0..rule_count {
        let (campaign, prefix) = CAMPAIGNS[index % CAMPAIGNS.len()];
        let (uses_per_coupon, uses_per_customer, usage_limit, usage_per_customer) =
            LIMITS[index % LIMITS.len()];

        let rule = Rule {
            id: 0,
            name: format!("{} #{}", campaign, index + 1),
            uses_per_coupon,
            uses_per_customer,
            times_used: 0,
            coupon_code: None,
        };
        let rule_id = db.rules().insert(&rule).await?;

        for position in 0..coupons_per_rule {
            let coupon = Coupon {
                id: 0,
                rule_id,
                code: generate_code(prefix),
                usage_limit,
                usage_per_customer,
                times_used: 0,
                is_primary: position == 0,
            };

            if let Err(e) = db.coupons().insert(&coupon).await {
                eprintln!("Failed to insert {}: {}", coupon.code, e);
                continue;
            }
            coupons_generated += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} rules and {} coupons in {:?}",
        rule_count, coupons_generated, elapsed
    );

    if let Some(rule) = db.rules().get_by_id(1).await? {
        let code = db.rules().primary_coupon_code(rule.id).await?;
        println!(
            "  Rule '{}' primary coupon: {}",
            rule.name,
            code.as_deref().unwrap_or("-")
        );
    }

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// `{PREFIX}-{8 uppercase hex chars}` from a random UUID.
fn generate_code(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, suffix[..8].to_uppercase())
}
