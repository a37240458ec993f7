//! # Coupon Repository
//!
//! Reads and writes `salesrule_coupon` rows. Codes are unique and matched
//! exactly.

use async_trait::async_trait;
use promo_core::repository::CouponRepository;
use promo_core::validation::{validate_coupon_code, validate_usage_value};
use promo_core::{CoreResult, Coupon, CouponId, RuleId};
use sqlx::SqlitePool;
use tracing::debug;

use crate::connection::DbHandle;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SqliteCouponRepository {
    conn: DbHandle,
}

impl SqliteCouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::on(DbHandle::Pool(pool))
    }

    pub(crate) fn on(conn: DbHandle) -> Self {
        SqliteCouponRepository { conn }
    }

    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        debug!(code = %code, "Loading coupon");

        let mut conn = self.conn.acquire().await?;
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT
                coupon_id AS id,
                rule_id,
                code,
                usage_limit,
                usage_per_customer,
                times_used,
                is_primary
            FROM salesrule_coupon
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(coupon)
    }

    pub async fn get_by_id(&self, id: CouponId) -> DbResult<Option<Coupon>> {
        let mut conn = self.conn.acquire().await?;
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT
                coupon_id AS id,
                rule_id,
                code,
                usage_limit,
                usage_per_customer,
                times_used,
                is_primary
            FROM salesrule_coupon
            WHERE coupon_id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(coupon)
    }

    /// Writes `times_used` back to the coupon's row.
    ///
    /// ## Errors
    /// `DbError::NotFound` if the coupon no longer exists.
    pub async fn update_times_used(&self, coupon_id: CouponId, times_used: i64) -> DbResult<()> {
        debug!(coupon_id, times_used, "Updating coupon usage");

        let mut conn = self.conn.acquire().await?;
        let result = sqlx::query(
            r#"
            UPDATE salesrule_coupon
            SET times_used = ?1
            WHERE coupon_id = ?2
            "#,
        )
        .bind(times_used)
        .bind(coupon_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", coupon_id));
        }

        Ok(())
    }

    /// Inserts a new coupon.
    ///
    /// The code is trimmed and must be unique. A non-positive `coupon.id`
    /// lets SQLite assign one.
    ///
    /// ## Returns
    /// The stored coupon id.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<CouponId> {
        let code = validate_coupon_code(&coupon.code)?;
        validate_usage_value("usage_limit", coupon.usage_limit)?;
        validate_usage_value("usage_per_customer", coupon.usage_per_customer)?;
        validate_usage_value("times_used", coupon.times_used)?;

        let id = (coupon.id > 0).then_some(coupon.id);

        let mut conn = self.conn.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO salesrule_coupon (
                coupon_id, rule_id, code, usage_limit,
                usage_per_customer, times_used, is_primary
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(id)
        .bind(coupon.rule_id)
        .bind(&code)
        .bind(coupon.usage_limit)
        .bind(coupon.usage_per_customer)
        .bind(coupon.times_used)
        .bind(coupon.is_primary)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.clone()),
            other => other,
        })?;

        let coupon_id = result.last_insert_rowid();
        debug!(coupon_id, rule_id = coupon.rule_id, code = %code, "Inserted coupon");

        Ok(coupon_id)
    }

    /// Counts coupons, optionally only those of one rule.
    pub async fn count(&self, rule_id: Option<RuleId>) -> DbResult<i64> {
        let mut conn = self.conn.acquire().await?;
        let count: i64 = match rule_id {
            Some(rule_id) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM salesrule_coupon WHERE rule_id = ?1")
                    .bind(rule_id)
                    .fetch_one(&mut *conn)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM salesrule_coupon")
                    .fetch_one(&mut *conn)
                    .await?
            }
        };

        Ok(count)
    }
}

#[async_trait]
impl CouponRepository for SqliteCouponRepository {
    async fn get_by_code(&self, code: &str) -> CoreResult<Option<Coupon>> {
        Ok(self.find_by_code(code).await?)
    }

    async fn save(&self, coupon: &Coupon) -> CoreResult<()> {
        Ok(self.update_times_used(coupon.id, coupon.times_used).await?)
    }
}
