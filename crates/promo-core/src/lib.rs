//! # promo-core: Usage Accounting for Sales Rules
//!
//! Keeps promotion rule and coupon usage counters in step with orders.
//! Storage is reached only through the traits in [`repository`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Promo Ledger Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Order workflow (place / cancel / revert)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ execute(order, direction)              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ promo-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────────┐  ┌──────────┐  ┌────────┐  │   │
//! │  │   │   types   │  │     usage      │  │repository│  │ memory │  │   │
//! │  │   │   Rule    │  │ UsageUpdater   │  │  traits  │  │  store │  │   │
//! │  │   │  Coupon   │  │ CouponUsage-   │  │          │  │        │  │   │
//! │  │   │  Order    │  │   Store        │  │          │  │        │  │   │
//! │  │   └───────────┘  └────────────────┘  └──────────┘  └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO SQL • NO CONNECTIONS • STORAGE BEHIND TRAITS              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    promo-db (Database Layer)                    │   │
//! │  │          SQLite repositories, migrations, configuration         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Rules, coupons, usage rows, order input
//! - [`usage`] - The updater and the per-customer coupon store
//! - [`repository`] - Storage traits
//! - [`memory`] - In-memory storage for tests and prototyping
//! - [`error`] - Domain error types
//! - [`validation`] - Parsing of raw order fields
//!
//! ## Example Usage
//!
//! ```rust
//! use promo_core::{InMemoryUsageStore, Order, Rule, UsageDirection};
//!
//! # tokio::runtime::Builder::new_current_thread()
//! #     .build()
//! #     .unwrap()
//! #     .block_on(async {
//! let store = InMemoryUsageStore::new();
//! store.insert_rule(Rule {
//!     id: 5,
//!     name: "Spring sale".to_string(),
//!     uses_per_coupon: 0,
//!     uses_per_customer: 0,
//!     times_used: 0,
//!     coupon_code: None,
//! });
//!
//! let order = Order::new(vec![5, 5], Some(42), None);
//! store
//!     .usage_updater()
//!     .execute(order, UsageDirection::Increment)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(store.rule(5).unwrap().times_used, 1);
//! # });
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod repository;
pub mod types;
pub mod usage;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, UsageEntity, ValidationError, COUPON_NOT_VALID_MESSAGE};
pub use memory::InMemoryUsageStore;
pub use types::*;
pub use usage::{CouponUsageStore, UsageDirection, UsageLimit, UsageUpdater};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a coupon code, matching the `salesrule_coupon.code` column.
pub const MAX_COUPON_CODE_LENGTH: usize = 255;
