//! # promo-db: Database Layer for Promo Ledger
//!
//! SQLite storage for rule and coupon usage counters, with sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Promo Ledger Data Flow                           │
//! │                                                                         │
//! │  Order workflow → promo_core::UsageUpdater                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     promo-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Rule          │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RuleCustomer  │    │ 001_sales_   │  │   │
//! │  │   │ LedgerConfig  │    │ Coupon        │    │   rules.sql  │  │   │
//! │  │   │               │    │ CouponUsage   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML + environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use promo_core::{Order, UsageDirection};
//! use promo_db::{Database, LedgerConfig};
//!
//! let db = Database::new(LedgerConfig::load(None)?.db_config()).await?;
//!
//! let order = Order::from_raw(Some("3,7"), Some(42), Some("SAVE10"))?;
//! db.execute_usage(order, UsageDirection::Increment).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
mod connection;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::LedgerConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::coupon::SqliteCouponRepository;
pub use repository::coupon_usage::SqliteCouponUsageRepository;
pub use repository::rule::SqliteRuleRepository;
pub use repository::rule_customer::SqliteRuleCustomerRepository;
