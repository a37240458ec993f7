//! # Coupon Usage Store
//!
//! Per-customer coupon counters.
//!
//! ```text
//! update_count(coupon, customer, +1/-1)
//!      │
//!      ▼
//! times_used(coupon_id, customer_id) ── missing row counts as 0
//!      │
//!      ├── increment AND usage_per_customer reached → UsageExceeded
//!      │
//!      ├── times_used > 0      → update_times_used(times_used ± 1)
//!      ├── increment           → insert(times_used = 1)
//!      └── decrement, no row   → nothing
//! ```

use tracing::debug;

use crate::error::{CoreResult, UsageEntity};
use crate::repository::DynCouponUsageRepository;
use crate::types::{Coupon, CouponCustomerUsage, CouponId, CustomerId};
use crate::usage::counter::{check_limit, UsageDirection};

/// Reads and writes the (coupon, customer) usage counter.
#[derive(Clone)]
pub struct CouponUsageStore {
    usage: DynCouponUsageRepository,
}

impl CouponUsageStore {
    pub fn new(usage: DynCouponUsageRepository) -> Self {
        CouponUsageStore { usage }
    }

    /// Moves a customer's usage of `coupon` one step in `direction`.
    ///
    /// ## Errors
    /// * `CoreError::UsageExceeded` - incrementing past `usage_per_customer`
    /// * `CoreError::Persistence` - the store failed
    pub async fn update_count(
        &self,
        coupon: &Coupon,
        customer_id: CustomerId,
        coupon_id: CouponId,
        direction: UsageDirection,
    ) -> CoreResult<()> {
        let times_used = self
            .usage
            .times_used(coupon_id, customer_id)
            .await?
            .unwrap_or(0);

        check_limit(
            UsageEntity::CouponCustomer,
            coupon.usage_per_customer,
            times_used,
            direction,
        )?;

        if times_used > 0 {
            let next = times_used + direction.delta();
            debug!(coupon_id, customer_id, times_used = next, "Updating coupon usage");
            self.usage
                .update_times_used(coupon_id, customer_id, next)
                .await?;
        } else if direction.is_increment() {
            debug!(coupon_id, customer_id, "Recording first coupon usage");
            self.usage
                .insert(&CouponCustomerUsage::first_use(coupon_id, customer_id))
                .await?;
        } else {
            debug!(coupon_id, customer_id, "No coupon usage to decrement");
        }

        Ok(())
    }

    /// Loads the usage row for a (customer, coupon) pair.
    ///
    /// Returns `None` without touching the store when either id is unset.
    pub async fn load_by_customer_coupon(
        &self,
        customer_id: CustomerId,
        coupon_id: CouponId,
    ) -> CoreResult<Option<CouponCustomerUsage>> {
        if customer_id <= 0 || coupon_id <= 0 {
            return Ok(None);
        }

        self.usage.get(coupon_id, customer_id).await
    }
}
