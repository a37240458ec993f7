//! # Domain Types
//!
//! Records the usage updater reads and writes, plus the order input.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐            ┌──────────────────────┐              │
//! │  │      Rule        │ 1 ───── n  │  RuleCustomerUsage   │              │
//! │  │  uses_per_coupon │            │  (rule, customer)    │              │
//! │  │  uses_per_cust.  │            │  times_used          │              │
//! │  │  times_used      │            └──────────────────────┘              │
//! │  └────────┬─────────┘                                                  │
//! │           │ 1                                                           │
//! │           │ n                                                           │
//! │  ┌────────┴─────────┐            ┌──────────────────────┐              │
//! │  │     Coupon       │ 1 ───── n  │ CouponCustomerUsage  │              │
//! │  │  code            │            │  (coupon, customer)  │              │
//! │  │  usage_limit     │            │  times_used          │              │
//! │  │  usage_per_cust. │            └──────────────────────┘              │
//! │  │  times_used      │                                                  │
//! │  └──────────────────┘                                                  │
//! │                                                                         │
//! │  Order (input, read-only): applied rule ids, customer, coupon code     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Limits
//! Every limit field uses `0` for "unlimited".

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::validation::{normalize_customer_id, parse_applied_rule_ids};

/// Promotion rule identifier.
pub type RuleId = i64;

/// Coupon identifier.
pub type CouponId = i64;

/// Customer identifier. Guests have none.
pub type CustomerId = i64;

// =============================================================================
// Rule
// =============================================================================

/// A promotion rule with an aggregate usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Rule {
    pub id: RuleId,

    pub name: String,

    /// Total redemptions allowed across all customers (0 = unlimited).
    pub uses_per_coupon: i64,

    /// Redemptions allowed per customer (0 = unlimited).
    pub uses_per_customer: i64,

    /// How many placed orders currently use this rule.
    pub times_used: i64,

    /// Primary coupon code, filled in by `RuleRepository::load_coupon_code`.
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub coupon_code: Option<String>,
}

// =============================================================================
// Rule Customer Usage
// =============================================================================

/// How often one customer has used one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RuleCustomerUsage {
    pub rule_id: RuleId,
    pub customer_id: CustomerId,
    pub times_used: i64,
}

impl RuleCustomerUsage {
    /// First usage of a rule by a customer.
    pub fn first_use(rule_id: RuleId, customer_id: CustomerId) -> Self {
        RuleCustomerUsage {
            rule_id,
            customer_id,
            times_used: 1,
        }
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// A redeemable code tied to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: CouponId,
    pub rule_id: RuleId,
    pub code: String,

    /// Total redemptions of this code (0 = unlimited).
    pub usage_limit: i64,

    /// Redemptions of this code per customer (0 = unlimited).
    pub usage_per_customer: i64,

    pub times_used: i64,

    /// The code shown for the rule when it has several.
    pub is_primary: bool,
}

// =============================================================================
// Coupon Customer Usage
// =============================================================================

/// How often one customer has redeemed one coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CouponCustomerUsage {
    pub coupon_id: CouponId,
    pub customer_id: CustomerId,
    pub times_used: i64,
}

impl CouponCustomerUsage {
    /// First redemption of a coupon by a customer.
    pub fn first_use(coupon_id: CouponId, customer_id: CustomerId) -> Self {
        CouponCustomerUsage {
            coupon_id,
            customer_id,
            times_used: 1,
        }
    }
}

// =============================================================================
// Order Input
// =============================================================================

/// Read access to the parts of an order that drive usage accounting.
///
/// Implemented by [`Order`]; callers with their own order type can implement
/// it directly.
pub trait UsageSubject {
    /// Applied rule ids in application order. May repeat and may contain `0`.
    fn applied_rule_ids(&self) -> &[RuleId];

    /// The ordering customer, `None` for guests.
    fn customer_id(&self) -> Option<CustomerId>;

    /// The coupon code entered on the order, if any.
    fn coupon_code(&self) -> Option<&str>;
}

/// The usage-relevant view of a placed (or cancelled) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub applied_rule_ids: Vec<RuleId>,
    pub customer_id: Option<CustomerId>,
    pub coupon_code: Option<String>,
}

impl Order {
    /// Builds an order from already-typed values.
    ///
    /// A customer id of `0` is treated as a guest.
    pub fn new(
        applied_rule_ids: Vec<RuleId>,
        customer_id: Option<CustomerId>,
        coupon_code: Option<String>,
    ) -> Self {
        Order {
            applied_rule_ids,
            customer_id: normalize_customer_id(customer_id),
            coupon_code,
        }
    }

    /// Builds an order from the raw values stored on a sales order.
    ///
    /// ## Arguments
    /// * `applied_rule_ids` - Comma-joined rule ids, e.g. `"3,7,3"`
    /// * `customer_id` - Raw customer id, `0` or `None` for guests
    /// * `coupon_code` - Entered coupon code; blank counts as none
    ///
    /// ## Errors
    /// `CoreError::Validation` if a rule id is not a non-negative integer.
    pub fn from_raw(
        applied_rule_ids: Option<&str>,
        customer_id: Option<i64>,
        coupon_code: Option<&str>,
    ) -> Result<Self, CoreError> {
        let rule_ids = match applied_rule_ids {
            Some(raw) => parse_applied_rule_ids(raw)?,
            None => Vec::new(),
        };

        let coupon_code = coupon_code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);

        Ok(Order::new(rule_ids, customer_id, coupon_code))
    }
}

impl UsageSubject for Order {
    fn applied_rule_ids(&self) -> &[RuleId] {
        &self.applied_rule_ids
    }

    fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }
}

impl<T: UsageSubject + ?Sized> UsageSubject for &T {
    fn applied_rule_ids(&self) -> &[RuleId] {
        (**self).applied_rule_ids()
    }

    fn customer_id(&self) -> Option<CustomerId> {
        (**self).customer_id()
    }

    fn coupon_code(&self) -> Option<&str> {
        (**self).coupon_code()
    }
}

// =============================================================================
// Place Order Details
// =============================================================================

/// Outcome of an order placement as reported back to the storefront.
///
/// Usage failures are reported here with their customer-safe text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderDetails {
    pub order_id: i64,
    pub errors: Vec<String>,
}

impl PlaceOrderDetails {
    pub fn new(order_id: i64) -> Self {
        PlaceOrderDetails {
            order_id,
            errors: Vec::new(),
        }
    }

    /// Appends an error message for the customer.
    pub fn add_error(&mut self, error: impl Into<String>) -> &mut Self {
        self.errors.push(error.into());
        self
    }

    /// Appends the customer-facing message for a failed usage update.
    pub fn record_failure(&mut self, err: &CoreError) -> &mut Self {
        self.add_error(err.user_message())
    }

    /// Returns true if nothing went wrong.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
