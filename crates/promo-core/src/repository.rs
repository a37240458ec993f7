//! # Repository Traits
//!
//! The persistence seams the usage updater depends on.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Implements What                                  │
//! │                                                                         │
//! │  UsageUpdater / CouponUsageStore (promo-core)                          │
//! │       │                                                                 │
//! │       │  Arc<dyn RuleRepository> ...                                   │
//! │       ▼                                                                 │
//! │  ┌───────────────────────┐   ┌───────────────────────────────────┐    │
//! │  │ InMemoryUsageStore    │   │ Sqlite*Repository (promo-db)      │    │
//! │  │ (tests, prototyping)  │   │ salesrule, salesrule_coupon, ...  │    │
//! │  └───────────────────────┘   └───────────────────────────────────┘    │
//! │                                                                         │
//! │  Lookups return Ok(None) for missing rows. A missing row is a          │
//! │  legitimate state, never an error.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations report store failures as `CoreError::Persistence`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{
    Coupon, CouponCustomerUsage, CouponId, CustomerId, Rule, RuleCustomerUsage, RuleId,
};

/// Promotion rule storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Loads a rule by id.
    async fn get(&self, id: RuleId) -> CoreResult<Option<Rule>>;

    /// Fills `rule.coupon_code` with the rule's primary coupon code.
    async fn load_coupon_code(&self, rule: &mut Rule) -> CoreResult<()>;

    /// Writes the rule's counter back.
    async fn save(&self, rule: &Rule) -> CoreResult<()>;
}

/// Per-customer rule usage storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleCustomerRepository: Send + Sync {
    /// Loads the usage row for a (customer, rule) pair.
    async fn get_by_customer_rule(
        &self,
        customer_id: CustomerId,
        rule_id: RuleId,
    ) -> CoreResult<Option<RuleCustomerUsage>>;

    /// Inserts or updates the row keyed by (rule_id, customer_id).
    async fn save(&self, usage: &RuleCustomerUsage) -> CoreResult<()>;
}

/// Coupon storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Loads a coupon by its code.
    async fn get_by_code(&self, code: &str) -> CoreResult<Option<Coupon>>;

    /// Writes the coupon's counter back.
    async fn save(&self, coupon: &Coupon) -> CoreResult<()>;
}

/// Per-customer coupon usage storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CouponUsageRepository: Send + Sync {
    /// Point read of `times_used` for a (coupon, customer) pair.
    async fn times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> CoreResult<Option<i64>>;

    /// Sets `times_used` on an existing (coupon, customer) row.
    async fn update_times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
        times_used: i64,
    ) -> CoreResult<()>;

    /// Inserts a new (coupon, customer) row.
    async fn insert(&self, usage: &CouponCustomerUsage) -> CoreResult<()>;

    /// Loads the full (coupon, customer) row.
    async fn get(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> CoreResult<Option<CouponCustomerUsage>>;
}

pub type DynRuleRepository = Arc<dyn RuleRepository>;
pub type DynRuleCustomerRepository = Arc<dyn RuleCustomerRepository>;
pub type DynCouponRepository = Arc<dyn CouponRepository>;
pub type DynCouponUsageRepository = Arc<dyn CouponUsageRepository>;
