//! # Usage Accounting
//!
//! - [`counter`] - Limit check and step arithmetic shared by every counter
//! - [`coupon_usage`] - Per-customer coupon counters
//! - [`updater`] - Walks an order and updates rule and coupon counters

pub mod counter;
pub mod coupon_usage;
pub mod updater;

pub use counter::{UsageDirection, UsageLimit};
pub use coupon_usage::CouponUsageStore;
pub use updater::UsageUpdater;
