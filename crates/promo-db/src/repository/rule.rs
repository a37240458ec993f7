//! # Rule Repository
//!
//! Reads and writes `salesrule` rows.

use async_trait::async_trait;
use promo_core::repository::RuleRepository;
use promo_core::validation::validate_usage_value;
use promo_core::{CoreResult, Rule, RuleId};
use sqlx::SqlitePool;
use tracing::debug;

use crate::connection::DbHandle;
use crate::error::{DbError, DbResult};

/// Repository for promotion rules.
///
/// ## Usage
/// ```rust,ignore
/// let repo = SqliteRuleRepository::new(pool);
/// let rule = repo.get_by_id(5).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteRuleRepository {
    conn: DbHandle,
}

impl SqliteRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::on(DbHandle::Pool(pool))
    }

    pub(crate) fn on(conn: DbHandle) -> Self {
        SqliteRuleRepository { conn }
    }

    /// Gets a rule by its ID.
    ///
    /// `coupon_code` is left empty; see [`primary_coupon_code`](Self::primary_coupon_code).
    pub async fn get_by_id(&self, id: RuleId) -> DbResult<Option<Rule>> {
        debug!(rule_id = id, "Loading rule");

        let mut conn = self.conn.acquire().await?;
        let rule = sqlx::query_as::<_, Rule>(
            r#"
            SELECT
                rule_id AS id,
                name,
                uses_per_coupon,
                uses_per_customer,
                times_used
            FROM salesrule
            WHERE rule_id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(rule)
    }

    /// The code of the rule's primary coupon, if it has one.
    pub async fn primary_coupon_code(&self, rule_id: RuleId) -> DbResult<Option<String>> {
        let mut conn = self.conn.acquire().await?;
        let code = sqlx::query_scalar::<_, String>(
            r#"
            SELECT code
            FROM salesrule_coupon
            WHERE rule_id = ?1 AND is_primary = 1
            ORDER BY coupon_id
            LIMIT 1
            "#,
        )
        .bind(rule_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(code)
    }

    /// Writes `times_used` back to the rule's row.
    ///
    /// ## Errors
    /// `DbError::NotFound` if the rule no longer exists.
    pub async fn update_times_used(&self, rule_id: RuleId, times_used: i64) -> DbResult<()> {
        debug!(rule_id, times_used, "Updating rule usage");

        let mut conn = self.conn.acquire().await?;
        let result = sqlx::query("UPDATE salesrule SET times_used = ?1 WHERE rule_id = ?2")
            .bind(times_used)
            .bind(rule_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Rule", rule_id));
        }

        Ok(())
    }

    /// Inserts a new rule.
    ///
    /// A non-positive `rule.id` lets SQLite assign one.
    ///
    /// ## Returns
    /// The stored rule id.
    pub async fn insert(&self, rule: &Rule) -> DbResult<RuleId> {
        validate_usage_value("uses_per_coupon", rule.uses_per_coupon)?;
        validate_usage_value("uses_per_customer", rule.uses_per_customer)?;
        validate_usage_value("times_used", rule.times_used)?;

        let id = (rule.id > 0).then_some(rule.id);

        let mut conn = self.conn.acquire().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO salesrule (rule_id, name, uses_per_coupon, uses_per_customer, times_used)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id)
        .bind(&rule.name)
        .bind(rule.uses_per_coupon)
        .bind(rule.uses_per_customer)
        .bind(rule.times_used)
        .execute(&mut *conn)
        .await?;

        let rule_id = result.last_insert_rowid();
        debug!(rule_id, name = %rule.name, "Inserted rule");

        Ok(rule_id)
    }

    /// Counts all rules.
    pub async fn count(&self) -> DbResult<i64> {
        let mut conn = self.conn.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM salesrule")
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl RuleRepository for SqliteRuleRepository {
    async fn get(&self, id: RuleId) -> CoreResult<Option<Rule>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn load_coupon_code(&self, rule: &mut Rule) -> CoreResult<()> {
        rule.coupon_code = self.primary_coupon_code(rule.id).await?;
        Ok(())
    }

    async fn save(&self, rule: &Rule) -> CoreResult<()> {
        Ok(self.update_times_used(rule.id, rule.times_used).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use promo_core::Coupon;

    fn new_rule(name: &str, uses_per_coupon: i64) -> Rule {
        Rule {
            id: 0,
            name: name.to_string(),
            uses_per_coupon,
            uses_per_customer: 0,
            times_used: 0,
            coupon_code: None,
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = db.rules();

        let id = repo.insert(&new_rule("Spring sale", 3)).await.unwrap();
        let rule = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(rule.id, id);
        assert_eq!(rule.name, "Spring sale");
        assert_eq!(rule.uses_per_coupon, 3);
        assert_eq!(rule.coupon_code, None);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_with_explicit_id() {
        let db = setup().await;
        let repo = db.rules();

        let id = repo
            .insert(&Rule {
                id: 42,
                ..new_rule("Fixed id", 0)
            })
            .await
            .unwrap();

        assert_eq!(id, 42);
        assert!(repo.get_by_id(42).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_rejects_negative_limit() {
        let db = setup().await;
        let result = db.rules().insert(&new_rule("Broken", -1)).await;
        assert!(matches!(result, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_rule_is_none() {
        let db = setup().await;
        assert!(db.rules().get(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_writes_counter() {
        let db = setup().await;
        let repo = db.rules();
        let id = repo.insert(&new_rule("Counter", 0)).await.unwrap();

        let mut rule = repo.get(id).await.unwrap().unwrap();
        rule.times_used = 4;
        repo.save(&rule).await.unwrap();

        assert_eq!(repo.get_by_id(id).await.unwrap().unwrap().times_used, 4);
    }

    #[tokio::test]
    async fn test_save_missing_rule_is_persistence_error() {
        let db = setup().await;
        let mut rule = new_rule("Ghost", 0);
        rule.id = 99;

        let err = db.rules().save(&rule).await.unwrap_err();
        assert!(matches!(err, promo_core::CoreError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_load_coupon_code_uses_primary() {
        let db = setup().await;
        let rule_id = db.rules().insert(&new_rule("Coded", 0)).await.unwrap();

        for (code, is_primary) in [("SECOND", false), ("FIRST", true)] {
            db.coupons()
                .insert(&Coupon {
                    id: 0,
                    rule_id,
                    code: code.to_string(),
                    usage_limit: 0,
                    usage_per_customer: 0,
                    times_used: 0,
                    is_primary,
                })
                .await
                .unwrap();
        }

        let repo = db.rules();
        let mut rule = repo.get(rule_id).await.unwrap().unwrap();
        repo.load_coupon_code(&mut rule).await.unwrap();

        assert_eq!(rule.coupon_code.as_deref(), Some("FIRST"));
    }
}
