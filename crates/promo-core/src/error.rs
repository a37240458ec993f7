//! # Error Types
//!
//! Domain-specific error types for promo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  promo-core errors (this file)                                         │
//! │  ├── CoreError        - Usage limits, persistence, validation          │
//! │  └── ValidationError  - Malformed order input at the boundary          │
//! │                                                                         │
//! │  promo-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, folded into                 │
//! │                         CoreError::Persistence at the trait seam        │
//! │                                                                         │
//! │  Flow: DbError → CoreError → order placement → customer message        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A limit violation is always reported with the same generic message so the
//! customer learns nothing about the limits themselves.

use std::fmt;

use thiserror::Error;

/// Message shown to the customer when any usage limit is hit.
pub const COUPON_NOT_VALID_MESSAGE: &str =
    "The coupon code isn't valid. Verify the code and try again.";

// =============================================================================
// Usage Entity
// =============================================================================

/// Which counter tripped a usage limit.
///
/// Only used for diagnostics; the customer-facing message never includes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageEntity {
    /// Rule aggregate counter vs `uses_per_coupon`.
    Rule,
    /// Per-customer rule counter vs `uses_per_customer`.
    RuleCustomer,
    /// Coupon aggregate counter vs `usage_limit`.
    Coupon,
    /// Per-customer coupon counter vs `usage_per_customer`.
    CouponCustomer,
}

impl fmt::Display for UsageEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageEntity::Rule => write!(f, "rule"),
            UsageEntity::RuleCustomer => write!(f, "rule_customer"),
            UsageEntity::Coupon => write!(f, "coupon"),
            UsageEntity::CouponCustomer => write!(f, "coupon_customer"),
        }
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while updating usage counters.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An increment would push a counter past its limit.
    ///
    /// ## When This Occurs
    /// - Rule `times_used` already at `uses_per_coupon`
    /// - Customer's rule usage already at `uses_per_customer`
    /// - Coupon `times_used` already at `usage_limit`
    /// - Customer's coupon usage already at `usage_per_customer`
    ///
    /// Never raised on decrement.
    #[error("The coupon code isn't valid. Verify the code and try again.")]
    UsageExceeded {
        entity: UsageEntity,
        limit: i64,
        times_used: i64,
    },

    /// The store failed underneath a repository call.
    ///
    /// Surfaced as-is; the core never retries.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a UsageExceeded error for the given counter.
    pub fn usage_exceeded(entity: UsageEntity, limit: i64, times_used: i64) -> Self {
        CoreError::UsageExceeded {
            entity,
            limit,
            times_used,
        }
    }

    /// Creates a Persistence error from any displayable store error.
    pub fn persistence(err: impl fmt::Display) -> Self {
        CoreError::Persistence(err.to_string())
    }

    /// Returns true if this error is a usage-limit violation.
    pub fn is_usage_exceeded(&self) -> bool {
        matches!(self, CoreError::UsageExceeded { .. })
    }

    /// Text that is safe to show to the customer placing the order.
    pub fn user_message(&self) -> &'static str {
        match self {
            CoreError::UsageExceeded { .. } => COUPON_NOT_VALID_MESSAGE,
            CoreError::Validation(_) => COUPON_NOT_VALID_MESSAGE,
            CoreError::Persistence(_) => "Something went wrong while applying the coupon. Try again later.",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for order data handed to the core.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g. a non-numeric rule id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_exceeded_message_is_generic() {
        let err = CoreError::usage_exceeded(UsageEntity::CouponCustomer, 1, 1);
        assert_eq!(
            err.to_string(),
            "The coupon code isn't valid. Verify the code and try again."
        );
        assert!(!err.to_string().contains("customer"));
        assert_eq!(err.user_message(), COUPON_NOT_VALID_MESSAGE);
        assert!(err.is_usage_exceeded());
    }

    #[test]
    fn test_persistence_error_keeps_source_text() {
        let err = CoreError::persistence("Query failed: disk I/O error");
        assert_eq!(
            err.to_string(),
            "Persistence failure: Query failed: disk I/O error"
        );
        assert!(!err.is_usage_exceeded());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "coupon_code".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_usage_entity_display() {
        assert_eq!(UsageEntity::Rule.to_string(), "rule");
        assert_eq!(UsageEntity::CouponCustomer.to_string(), "coupon_customer");
    }
}
