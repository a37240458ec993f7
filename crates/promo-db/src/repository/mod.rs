//! # Repository Module
//!
//! SQLite implementations of the `promo_core::repository` traits.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Trait → Table                                        │
//! │                                                                         │
//! │  RuleRepository           → SqliteRuleRepository         (salesrule)   │
//! │  RuleCustomerRepository   → SqliteRuleCustomerRepository               │
//! │                                               (salesrule_customer)     │
//! │  CouponRepository         → SqliteCouponRepository  (salesrule_coupon) │
//! │  CouponUsageRepository    → SqliteCouponUsageRepository                │
//! │                                           (salesrule_coupon_usage)     │
//! │                                                                         │
//! │  Each type also has DbResult-returning inherent methods, used by the   │
//! │  trait impls and by the seed tool. DbError becomes                     │
//! │  CoreError::Persistence when it crosses the trait.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod coupon;
pub mod coupon_usage;
pub mod rule;
pub mod rule_customer;
