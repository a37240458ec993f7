//! # Validation Module
//!
//! Parsing and validation of order data before it reaches the usage updater.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Input Gets Checked                           │
//! │                                                                         │
//! │  Sales order row                                                        │
//! │  ├── applied_rule_ids = "3,7,,3"   (string)                            │
//! │  ├── customer_id      = 0          (guest)                             │
//! │  └── coupon_code      = " SAVE10 "                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  THIS MODULE (once, at the boundary)                                   │
//! │  ├── rule ids → Vec<RuleId>, zero kept for empty segments              │
//! │  ├── customer 0 → None                                                 │
//! │  └── coupon code trimmed, length-checked                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  UsageUpdater (works on typed values only)                             │
//! │                                                                         │
//! │  Layer below: SQLite CHECK constraints keep counters non-negative      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use promo_core::validation::{parse_applied_rule_ids, validate_coupon_code};
//!
//! assert_eq!(parse_applied_rule_ids("3,7").unwrap(), vec![3, 7]);
//! assert!(validate_coupon_code("SAVE10").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::{CustomerId, RuleId};
use crate::MAX_COUPON_CODE_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Order Field Parsers
// =============================================================================

/// Parses the comma-joined applied rule ids stored on an order.
///
/// ## Rules
/// - Segments are separated by `,` and trimmed
/// - Empty segments become `0` (the updater skips them)
/// - Each other segment must be a non-negative integer
/// - Order and duplicates are preserved; de-duplication is the updater's job
///
/// ## Example
/// ```rust
/// use promo_core::validation::parse_applied_rule_ids;
///
/// assert_eq!(parse_applied_rule_ids("").unwrap(), Vec::<i64>::new());
/// assert_eq!(parse_applied_rule_ids("5, 2,,5").unwrap(), vec![5, 2, 0, 5]);
/// assert!(parse_applied_rule_ids("5,x").is_err());
/// assert!(parse_applied_rule_ids("-1").is_err());
/// ```
pub fn parse_applied_rule_ids(raw: &str) -> ValidationResult<Vec<RuleId>> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Ok(Vec::new());
    }

    raw.split(',')
        .map(str::trim)
        .map(|segment| {
            if segment.is_empty() {
                return Ok(0);
            }

            match segment.parse::<RuleId>() {
                Ok(id) if id >= 0 => Ok(id),
                _ => Err(ValidationError::InvalidFormat {
                    field: "applied_rule_ids".to_string(),
                    reason: format!("'{}' is not a rule id", segment),
                }),
            }
        })
        .collect()
}

/// Normalizes a raw customer id.
///
/// `None`, `0` and negative values all mean "guest".
///
/// ## Example
/// ```rust
/// use promo_core::validation::normalize_customer_id;
///
/// assert_eq!(normalize_customer_id(Some(42)), Some(42));
/// assert_eq!(normalize_customer_id(Some(0)), None);
/// assert_eq!(normalize_customer_id(None), None);
/// ```
pub fn normalize_customer_id(raw: Option<i64>) -> Option<CustomerId> {
    raw.filter(|id| *id > 0)
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a coupon code.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most MAX_COUPON_CODE_LENGTH (255) characters
///
/// ## Returns
/// The trimmed code.
pub fn validate_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "coupon_code".to_string(),
        });
    }

    if code.chars().count() > MAX_COUPON_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "coupon_code".to_string(),
            max: MAX_COUPON_CODE_LENGTH,
        });
    }

    Ok(code.to_string())
}

/// Validates a usage limit or counter value.
///
/// ## Rules
/// - Must be non-negative (0 means unlimited for limits)
pub fn validate_usage_value(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not be negative".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
