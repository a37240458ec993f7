//! # Rule Customer Repository
//!
//! Per-customer rule usage in `salesrule_customer`, one row per
//! (rule_id, customer_id).

use async_trait::async_trait;
use promo_core::repository::RuleCustomerRepository;
use promo_core::{CoreResult, CustomerId, RuleCustomerUsage, RuleId};
use sqlx::SqlitePool;
use tracing::debug;

use crate::connection::DbHandle;
use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SqliteRuleCustomerRepository {
    conn: DbHandle,
}

impl SqliteRuleCustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::on(DbHandle::Pool(pool))
    }

    pub(crate) fn on(conn: DbHandle) -> Self {
        SqliteRuleCustomerRepository { conn }
    }

    pub async fn find(
        &self,
        customer_id: CustomerId,
        rule_id: RuleId,
    ) -> DbResult<Option<RuleCustomerUsage>> {
        debug!(rule_id, customer_id, "Loading customer rule usage");

        let mut conn = self.conn.acquire().await?;
        let usage = sqlx::query_as::<_, RuleCustomerUsage>(
            r#"
            SELECT rule_id, customer_id, times_used
            FROM salesrule_customer
            WHERE customer_id = ?1 AND rule_id = ?2
            "#,
        )
        .bind(customer_id)
        .bind(rule_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(usage)
    }

    /// Inserts the row, or overwrites `times_used` if it already exists.
    pub async fn upsert(&self, usage: &RuleCustomerUsage) -> DbResult<()> {
        debug!(
            rule_id = usage.rule_id,
            customer_id = usage.customer_id,
            times_used = usage.times_used,
            "Saving customer rule usage"
        );

        let mut conn = self.conn.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO salesrule_customer (rule_id, customer_id, times_used)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (rule_id, customer_id)
            DO UPDATE SET times_used = excluded.times_used
            "#,
        )
        .bind(usage.rule_id)
        .bind(usage.customer_id)
        .bind(usage.times_used)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Number of customers with a usage row for the rule.
    pub async fn count_for_rule(&self, rule_id: RuleId) -> DbResult<i64> {
        let mut conn = self.conn.acquire().await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM salesrule_customer WHERE rule_id = ?1")
                .bind(rule_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(count)
    }
}

#[async_trait]
impl RuleCustomerRepository for SqliteRuleCustomerRepository {
    async fn get_by_customer_rule(
        &self,
        customer_id: CustomerId,
        rule_id: RuleId,
    ) -> CoreResult<Option<RuleCustomerUsage>> {
        Ok(self.find(customer_id, rule_id).await?)
    }

    async fn save(&self, usage: &RuleCustomerUsage) -> CoreResult<()> {
        Ok(self.upsert(usage).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use promo_core::Rule;

    async fn setup() -> (Database, RuleId) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rule_id = db
            .rules()
            .insert(&Rule {
                id: 0,
                name: "Loyalty".to_string(),
                uses_per_coupon: 0,
                uses_per_customer: 2,
                times_used: 0,
                coupon_code: None,
            })
            .await
            .unwrap();
        (db, rule_id)
    }

    #[tokio::test]
    async fn test_save_inserts_then_updates() {
        let (db, rule_id) = setup().await;
        let repo = db.rule_customers();

        repo.save(&RuleCustomerUsage::first_use(rule_id, 42))
            .await
            .unwrap();
        repo.save(&RuleCustomerUsage {
            rule_id,
            customer_id: 42,
            times_used: 2,
        })
        .await
        .unwrap();

        let usage = repo.get_by_customer_rule(42, rule_id).await.unwrap().unwrap();
        assert_eq!(usage.times_used, 2);
        assert_eq!(repo.count_for_rule(rule_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rows_are_per_customer() {
        let (db, rule_id) = setup().await;
        let repo = db.rule_customers();

        repo.upsert(&RuleCustomerUsage::first_use(rule_id, 1))
            .await
            .unwrap();

        assert!(repo.find(2, rule_id).await.unwrap().is_none());
        assert!(repo.find(1, rule_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_rule_is_rejected() {
        let (db, _) = setup().await;

        let err = db
            .rule_customers()
            .upsert(&RuleCustomerUsage::first_use(404, 42))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
