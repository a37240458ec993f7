//! # Counter Arithmetic
//!
//! The two rules every usage counter follows:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. LIMIT CHECK (increment only)                                        │
//! │     limit > 0 AND times_used >= limit  →  UsageExceeded                 │
//! │                                                                         │
//! │  2. STEP                                                                │
//! │     increment            →  times_used + 1                              │
//! │     decrement, used > 0  →  times_used - 1                              │
//! │     decrement, used = 0  →  nothing to write                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule 2 is what makes a double cancellation harmless.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, UsageEntity};

// =============================================================================
// Usage Direction
// =============================================================================

/// Whether an order is being placed or taken back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageDirection {
    /// Order placed.
    Increment,
    /// Order cancelled or reverted.
    Decrement,
}

impl UsageDirection {
    /// Maps the `increment` flag used by order workflows.
    #[inline]
    pub const fn from_increment(increment: bool) -> Self {
        if increment {
            UsageDirection::Increment
        } else {
            UsageDirection::Decrement
        }
    }

    #[inline]
    pub const fn is_increment(&self) -> bool {
        matches!(self, UsageDirection::Increment)
    }

    /// +1 or -1.
    #[inline]
    pub const fn delta(&self) -> i64 {
        match self {
            UsageDirection::Increment => 1,
            UsageDirection::Decrement => -1,
        }
    }
}

impl std::fmt::Display for UsageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageDirection::Increment => write!(f, "increment"),
            UsageDirection::Decrement => write!(f, "decrement"),
        }
    }
}

// =============================================================================
// Usage Limit
// =============================================================================

/// A usage cap where `0` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimit(i64);

impl UsageLimit {
    #[inline]
    pub const fn new(limit: i64) -> Self {
        UsageLimit(limit)
    }

    #[inline]
    pub const fn value(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_unlimited(&self) -> bool {
        self.0 <= 0
    }

    /// True when one more use would go past the cap.
    #[inline]
    pub const fn is_reached(&self, times_used: i64) -> bool {
        !self.is_unlimited() && times_used >= self.0
    }
}

// =============================================================================
// Counter Rules
// =============================================================================

/// Fails with `UsageExceeded` if incrementing would break `limit`.
///
/// Decrements always pass.
pub fn check_limit(
    entity: UsageEntity,
    limit: i64,
    times_used: i64,
    direction: UsageDirection,
) -> CoreResult<()> {
    if direction.is_increment() && UsageLimit::new(limit).is_reached(times_used) {
        return Err(CoreError::usage_exceeded(entity, limit, times_used));
    }

    Ok(())
}

/// The counter value to write, or `None` when a decrement hits zero.
pub fn next_times_used(current: i64, direction: UsageDirection) -> Option<i64> {
    if direction.is_increment() || current > 0 {
        Some(current + direction.delta())
    } else {
        None
    }
}
