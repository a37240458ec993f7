//! # Coupon Usage Repository
//!
//! Per-customer coupon usage in `salesrule_coupon_usage`, keyed by
//! (coupon_id, customer_id).

use async_trait::async_trait;
use promo_core::repository::CouponUsageRepository;
use promo_core::{CoreResult, CouponCustomerUsage, CouponId, CustomerId};
use sqlx::SqlitePool;
use tracing::debug;

use crate::connection::DbHandle;
use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SqliteCouponUsageRepository {
    conn: DbHandle,
}

impl SqliteCouponUsageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::on(DbHandle::Pool(pool))
    }

    pub(crate) fn on(conn: DbHandle) -> Self {
        SqliteCouponUsageRepository { conn }
    }

    /// Point read of the counter; `None` when the customer never used the coupon.
    pub async fn fetch_times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> DbResult<Option<i64>> {
        let mut conn = self.conn.acquire().await?;
        let times_used = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT times_used
            FROM salesrule_coupon_usage
            WHERE coupon_id = ?1 AND customer_id = ?2
            "#,
        )
        .bind(coupon_id)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        debug!(coupon_id, customer_id, ?times_used, "Loaded coupon usage");
        Ok(times_used)
    }

    /// Sets the counter on an existing row. A missing row is left alone.
    pub async fn set_times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
        times_used: i64,
    ) -> DbResult<()> {
        debug!(coupon_id, customer_id, times_used, "Updating coupon usage");

        let mut conn = self.conn.acquire().await?;
        sqlx::query(
            r#"
            UPDATE salesrule_coupon_usage
            SET times_used = ?1
            WHERE coupon_id = ?2 AND customer_id = ?3
            "#,
        )
        .bind(times_used)
        .bind(coupon_id)
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a new row.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` if the (coupon, customer) row already exists.
    pub async fn insert_usage(&self, usage: &CouponCustomerUsage) -> DbResult<()> {
        debug!(
            coupon_id = usage.coupon_id,
            customer_id = usage.customer_id,
            times_used = usage.times_used,
            "Inserting coupon usage"
        );

        let mut conn = self.conn.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO salesrule_coupon_usage (coupon_id, customer_id, times_used)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(usage.coupon_id)
        .bind(usage.customer_id)
        .bind(usage.times_used)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn find(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> DbResult<Option<CouponCustomerUsage>> {
        let mut conn = self.conn.acquire().await?;
        let usage = sqlx::query_as::<_, CouponCustomerUsage>(
            r#"
            SELECT coupon_id, customer_id, times_used
            FROM salesrule_coupon_usage
            WHERE coupon_id = ?1 AND customer_id = ?2
            "#,
        )
        .bind(coupon_id)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(usage)
    }

    /// Number of customers who have a usage row for the coupon.
    pub async fn count_for_coupon(&self, coupon_id: CouponId) -> DbResult<i64> {
        let mut conn = self.conn.acquire().await?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM salesrule_coupon_usage WHERE coupon_id = ?1",
        )
        .bind(coupon_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl CouponUsageRepository for SqliteCouponUsageRepository {
    async fn times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> CoreResult<Option<i64>> {
        Ok(self.fetch_times_used(coupon_id, customer_id).await?)
    }

    async fn update_times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
        times_used: i64,
    ) -> CoreResult<()> {
        Ok(self.set_times_used(coupon_id, customer_id, times_used).await?)
    }

    async fn insert(&self, usage: &CouponCustomerUsage) -> CoreResult<()> {
        Ok(self.insert_usage(usage).await?)
    }

    async fn get(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> CoreResult<Option<CouponCustomerUsage>> {
        Ok(self.find(coupon_id, customer_id).await?)
    }
}
