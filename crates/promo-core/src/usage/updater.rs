//! # Usage Updater
//!
//! Applies one order placement (or cancellation) to every usage counter.
//!
//! ## Update Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     execute(order, direction)                           │
//! │                                                                         │
//! │  no non-zero applied rules? ──────────────────────► return order        │
//! │                                                                         │
//! │  for each distinct non-zero rule id (first-seen order):                │
//! │  ├── rule aggregate        check uses_per_coupon, step, save           │
//! │  └── customer known?       check uses_per_customer, step, upsert       │
//! │                                                                         │
//! │  coupon code on order and found?                                       │
//! │  ├── coupon aggregate      check usage_limit, step, save               │
//! │  └── customer known?       CouponUsageStore::update_count              │
//! │                                                                         │
//! │  return order                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each counter is checked and written before the next is looked at. A
//! failure part way through leaves the earlier writes in place; callers that
//! need all-or-nothing wrap the call in a transaction of their store.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{CoreResult, UsageEntity};
use crate::repository::{DynCouponRepository, DynRuleCustomerRepository, DynRuleRepository};
use crate::types::{CustomerId, Rule, RuleCustomerUsage, RuleId, UsageSubject};
use crate::usage::counter::{check_limit, next_times_used, UsageDirection};
use crate::usage::coupon_usage::CouponUsageStore;

/// Keeps rule and coupon usage counters in step with orders.
#[derive(Clone)]
pub struct UsageUpdater {
    rules: DynRuleRepository,
    rule_customers: DynRuleCustomerRepository,
    coupons: DynCouponRepository,
    coupon_usage: CouponUsageStore,
}

impl UsageUpdater {
    pub fn new(
        rules: DynRuleRepository,
        rule_customers: DynRuleCustomerRepository,
        coupons: DynCouponRepository,
        coupon_usage: CouponUsageStore,
    ) -> Self {
        UsageUpdater {
            rules,
            rule_customers,
            coupons,
            coupon_usage,
        }
    }

    /// Increments or decrements every counter touched by `order`.
    ///
    /// ## Returns
    /// The same order, unchanged.
    ///
    /// ## Errors
    /// * `CoreError::UsageExceeded` - an increment would break a limit
    /// * `CoreError::Persistence` - a repository call failed
    ///
    /// Processing stops at the first error.
    pub async fn execute<O: UsageSubject>(
        &self,
        order: O,
        direction: UsageDirection,
    ) -> CoreResult<O> {
        let rule_ids = distinct_rule_ids(order.applied_rule_ids());
        if rule_ids.is_empty() {
            debug!(%direction, "Order has no applied rules, nothing to update");
            return Ok(order);
        }

        let customer_id = order.customer_id().filter(|id| *id > 0);
        if customer_id.is_none() {
            debug!("Guest order, skipping per-customer counters");
        }

        for rule_id in rule_ids {
            self.update_rule_usage(direction, rule_id, customer_id).await?;
        }

        if let Some(code) = order.coupon_code().filter(|code| !code.is_empty()) {
            self.update_coupon_usage(code, direction, customer_id).await?;
        }

        Ok(order)
    }

    /// Like [`execute`](Self::execute), but tolerates a missing order.
    pub async fn execute_optional<O: UsageSubject>(
        &self,
        order: Option<O>,
        direction: UsageDirection,
    ) -> CoreResult<Option<O>> {
        match order {
            Some(order) => self.execute(order, direction).await.map(Some),
            None => Ok(None),
        }
    }

    async fn update_rule_usage(
        &self,
        direction: UsageDirection,
        rule_id: RuleId,
        customer_id: Option<CustomerId>,
    ) -> CoreResult<()> {
        let Some(mut rule) = self.rules.get(rule_id).await? else {
            debug!(rule_id, "Rule not found, skipping");
            return Ok(());
        };

        self.rules.load_coupon_code(&mut rule).await?;

        check_limit(
            UsageEntity::Rule,
            rule.uses_per_coupon,
            rule.times_used,
            direction,
        )?;

        if let Some(next) = next_times_used(rule.times_used, direction) {
            rule.times_used = next;
            debug!(rule_id, times_used = next, %direction, "Saving rule usage");
            self.rules.save(&rule).await?;
        }

        if let Some(customer_id) = customer_id {
            self.update_customer_rule_usage(&rule, direction, customer_id)
                .await?;
        }

        Ok(())
    }

    async fn update_customer_rule_usage(
        &self,
        rule: &Rule,
        direction: UsageDirection,
        customer_id: CustomerId,
    ) -> CoreResult<()> {
        let existing = self
            .rule_customers
            .get_by_customer_rule(customer_id, rule.id)
            .await?;
        let times_used = existing.as_ref().map_or(0, |usage| usage.times_used);

        check_limit(
            UsageEntity::RuleCustomer,
            rule.uses_per_customer,
            times_used,
            direction,
        )?;

        let to_save = match existing {
            Some(mut usage) => next_times_used(usage.times_used, direction).map(|next| {
                usage.times_used = next;
                usage
            }),
            None if direction.is_increment() => {
                Some(RuleCustomerUsage::first_use(rule.id, customer_id))
            }
            None => None,
        };

        if let Some(usage) = to_save {
            debug!(
                rule_id = rule.id,
                customer_id,
                times_used = usage.times_used,
                "Saving customer rule usage"
            );
            self.rule_customers.save(&usage).await?;
        }

        Ok(())
    }

    async fn update_coupon_usage(
        &self,
        code: &str,
        direction: UsageDirection,
        customer_id: Option<CustomerId>,
    ) -> CoreResult<()> {
        let Some(mut coupon) = self.coupons.get_by_code(code).await? else {
            debug!(code, "Coupon not found, skipping");
            return Ok(());
        };

        check_limit(
            UsageEntity::Coupon,
            coupon.usage_limit,
            coupon.times_used,
            direction,
        )?;

        if let Some(next) = next_times_used(coupon.times_used, direction) {
            coupon.times_used = next;
            debug!(coupon_id = coupon.id, times_used = next, %direction, "Saving coupon usage");
            self.coupons.save(&coupon).await?;
        }

        if let Some(customer_id) = customer_id {
            self.coupon_usage
                .update_count(&coupon, customer_id, coupon.id, direction)
                .await?;
        }

        Ok(())
    }
}

/// Distinct non-zero rule ids, in the order they were first applied.
pub(crate) fn distinct_rule_ids(ids: &[RuleId]) -> Vec<RuleId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .copied()
        .filter(|id| *id != 0 && seen.insert(*id))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::CoreError;
    use crate::memory::InMemoryUsageStore;
    use crate::repository::{
        MockCouponRepository, MockCouponUsageRepository, MockRuleCustomerRepository,
        MockRuleRepository,
    };
    use crate::types::{Coupon, CouponCustomerUsage, Order};

    fn rule(id: RuleId, uses_per_coupon: i64, uses_per_customer: i64, times_used: i64) -> Rule {
        Rule {
            id,
            name: format!("Rule {}", id),
            uses_per_coupon,
            uses_per_customer,
            times_used,
            coupon_code: None,
        }
    }

    fn coupon(
        id: i64,
        rule_id: RuleId,
        code: &str,
        usage_limit: i64,
        usage_per_customer: i64,
    ) -> Coupon {
        Coupon {
            id,
            rule_id,
            code: code.to_string(),
            usage_limit,
            usage_per_customer,
            times_used: 0,
            is_primary: true,
        }
    }

    fn untouchable_updater() -> UsageUpdater {
        UsageUpdater::new(
            Arc::new(MockRuleRepository::new()),
            Arc::new(MockRuleCustomerRepository::new()),
            Arc::new(MockCouponRepository::new()),
            CouponUsageStore::new(Arc::new(MockCouponUsageRepository::new())),
        )
    }

    #[test]
    fn test_distinct_rule_ids() {
        assert_eq!(distinct_rule_ids(&[5, 5, 2, 0, 5, 2]), vec![5, 2]);
        assert_eq!(distinct_rule_ids(&[0, 0]), Vec::<RuleId>::new());
        assert_eq!(distinct_rule_ids(&[3, 1, 2]), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_order_without_rules_touches_nothing() {
        let updater = untouchable_updater();
        let order = Order::new(vec![], Some(42), Some("SAVE10".to_string()));

        let placed = updater
            .execute(order.clone(), UsageDirection::Increment)
            .await
            .unwrap();
        assert_eq!(placed, order);

        let cancelled = updater
            .execute(order.clone(), UsageDirection::Decrement)
            .await
            .unwrap();
        assert_eq!(cancelled, order);
    }

    #[tokio::test]
    async fn test_zero_rule_ids_are_skipped() {
        let updater = untouchable_updater();
        let order = Order::new(vec![0, 0], Some(42), None);

        assert!(updater.execute(order, UsageDirection::Increment).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_zero_rule_ids_leave_coupon_alone() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_coupon(coupon(9, 5, "SAVE10", 0, 0));

        let order = Order::from_raw(Some("0"), Some(42), Some("SAVE10")).unwrap();
        let returned = store
            .usage_updater()
            .execute(order.clone(), UsageDirection::Increment)
            .await
            .unwrap();

        assert_eq!(returned, order);
        assert_eq!(store.coupon(9).unwrap().times_used, 0);
        assert!(store.coupon_usage(9, 42).is_none());
    }

    #[tokio::test]
    async fn test_missing_order_is_a_no_op() {
        let updater = untouchable_updater();
        let result = updater
            .execute_optional(None::<Order>, UsageDirection::Increment)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_rule_increment_below_limit() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 3, 0, 2));
        let updater = store.usage_updater();

        let order = Order::new(vec![5], None, None);
        updater.execute(order, UsageDirection::Increment).await.unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 3);
    }

    #[tokio::test]
    async fn test_rule_at_limit_rejects_increment() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 3, 0, 3));
        let updater = store.usage_updater();

        let err = updater
            .execute(Order::new(vec![5], Some(42), None), UsageDirection::Increment)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::UsageExceeded {
                entity: UsageEntity::Rule,
                limit: 3,
                times_used: 3
            }
        ));
        assert_eq!(store.rule(5).unwrap().times_used, 3);
        assert!(store.rule_customer(5, 42).is_none());
    }

    #[tokio::test]
    async fn test_decrement_ignores_limits() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 3, 0, 3));
        let updater = store.usage_updater();

        updater
            .execute(Order::new(vec![5], None, None), UsageDirection::Decrement)
            .await
            .unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 2);
    }

    #[tokio::test]
    async fn test_decrement_at_zero_stays_zero() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_coupon(coupon(9, 5, "SAVE10", 0, 0));
        let updater = store.usage_updater();

        let order = Order::new(vec![5], Some(42), Some("SAVE10".to_string()));
        updater.execute(order, UsageDirection::Decrement).await.unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 0);
        assert_eq!(store.coupon(9).unwrap().times_used, 0);
        assert!(store.rule_customer(5, 42).is_none());
        assert!(store.coupon_usage(9, 42).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_rule_ids_counted_once() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_rule(rule(7, 0, 0, 0));
        let updater = store.usage_updater();

        let order = Order::new(vec![5, 7, 5, 0, 7], Some(42), None);
        updater.execute(order, UsageDirection::Increment).await.unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 1);
        assert_eq!(store.rule(7).unwrap().times_used, 1);
        assert_eq!(store.rule_customer(5, 42).unwrap().times_used, 1);
        assert_eq!(store.rule_customer(7, 42).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_unknown_rule_is_skipped() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_coupon(coupon(9, 5, "SAVE10", 0, 0));
        let updater = store.usage_updater();

        let order = Order::new(vec![404, 5], Some(42), Some("SAVE10".to_string()));
        updater.execute(order, UsageDirection::Increment).await.unwrap();

        assert!(store.rule(404).is_none());
        assert_eq!(store.rule(5).unwrap().times_used, 1);
        assert_eq!(store.coupon(9).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_unknown_coupon_is_skipped() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        let updater = store.usage_updater();

        let order = Order::new(vec![5], Some(42), Some("NOPE".to_string()));
        updater.execute(order, UsageDirection::Increment).await.unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_round_trip_restores_counters() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 10, 5, 4));
        store.insert_coupon(Coupon {
            times_used: 2,
            ..coupon(9, 5, "SAVE10", 10, 5)
        });
        store.put_rule_customer(RuleCustomerUsage {
            rule_id: 5,
            customer_id: 42,
            times_used: 1,
        });
        store.put_coupon_usage(CouponCustomerUsage {
            coupon_id: 9,
            customer_id: 42,
            times_used: 1,
        });
        let updater = store.usage_updater();

        let order = Order::new(vec![5], Some(42), Some("SAVE10".to_string()));
        let order = updater.execute(order, UsageDirection::Increment).await.unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 5);
        assert_eq!(store.coupon(9).unwrap().times_used, 3);
        assert_eq!(store.rule_customer(5, 42).unwrap().times_used, 2);
        assert_eq!(store.coupon_usage(9, 42).unwrap().times_used, 2);

        updater.execute(order, UsageDirection::Decrement).await.unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 4);
        assert_eq!(store.coupon(9).unwrap().times_used, 2);
        assert_eq!(store.rule_customer(5, 42).unwrap().times_used, 1);
        assert_eq!(store.coupon_usage(9, 42).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_coupon_per_customer_limit_after_aggregate_write() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_coupon(coupon(9, 5, "SAVE10", 0, 1));
        store.put_coupon_usage(CouponCustomerUsage {
            coupon_id: 9,
            customer_id: 42,
            times_used: 1,
        });
        let updater = store.usage_updater();

        let order = Order::new(vec![5], Some(42), Some("SAVE10".to_string()));
        let err = updater
            .execute(order, UsageDirection::Increment)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::UsageExceeded {
                entity: UsageEntity::CouponCustomer,
                ..
            }
        ));
        assert_eq!(err.user_message(), crate::error::COUPON_NOT_VALID_MESSAGE);

        // The aggregate counter was written before the per-customer check ran
        assert_eq!(store.coupon(9).unwrap().times_used, 1);
        assert_eq!(store.coupon_usage(9, 42).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_rule_per_customer_limit_after_aggregate_write() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 1, 7));
        store.put_rule_customer(RuleCustomerUsage {
            rule_id: 5,
            customer_id: 42,
            times_used: 1,
        });
        let updater = store.usage_updater();

        let err = updater
            .execute(Order::new(vec![5], Some(42), None), UsageDirection::Increment)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::UsageExceeded {
                entity: UsageEntity::RuleCustomer,
                limit: 1,
                times_used: 1
            }
        ));
        assert_eq!(store.rule(5).unwrap().times_used, 8);
        assert_eq!(store.rule_customer(5, 42).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_coupon_aggregate_limit() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_coupon(Coupon {
            times_used: 2,
            ..coupon(9, 5, "SAVE10", 2, 0)
        });
        let updater = store.usage_updater();

        let order = Order::new(vec![5], None, Some("SAVE10".to_string()));
        let err = updater
            .execute(order.clone(), UsageDirection::Increment)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::UsageExceeded {
                entity: UsageEntity::Coupon,
                ..
            }
        ));
        assert_eq!(store.coupon(9).unwrap().times_used, 2);

        updater.execute(order, UsageDirection::Decrement).await.unwrap();
        assert_eq!(store.coupon(9).unwrap().times_used, 1);
    }

    #[tokio::test]
    async fn test_unlimited_coupon_keeps_counting() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 0));
        store.insert_coupon(coupon(9, 5, "SAVE10", 0, 0));
        let updater = store.usage_updater();

        for _ in 0..25 {
            let order = Order::new(vec![5], Some(42), Some("SAVE10".to_string()));
            updater.execute(order, UsageDirection::Increment).await.unwrap();
        }

        assert_eq!(store.rule(5).unwrap().times_used, 25);
        assert_eq!(store.coupon(9).unwrap().times_used, 25);
        assert_eq!(store.coupon_usage(9, 42).unwrap().times_used, 25);
    }

    #[tokio::test]
    async fn test_guest_order_skips_per_customer_counters() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 1, 0));
        store.insert_coupon(coupon(9, 5, "SAVE10", 0, 1));

        let mut rule_customers = MockRuleCustomerRepository::new();
        rule_customers.expect_get_by_customer_rule().never();
        rule_customers.expect_save().never();
        let mut coupon_usage = MockCouponUsageRepository::new();
        coupon_usage.expect_times_used().never();
        coupon_usage.expect_insert().never();

        let updater = UsageUpdater::new(
            Arc::new(store.clone()),
            Arc::new(rule_customers),
            Arc::new(store.clone()),
            CouponUsageStore::new(Arc::new(coupon_usage)),
        );

        for customer_id in [None, Some(0)] {
            let order = Order {
                applied_rule_ids: vec![5],
                customer_id,
                coupon_code: Some("SAVE10".to_string()),
            };
            updater.execute(order, UsageDirection::Increment).await.unwrap();
        }

        assert_eq!(store.rule(5).unwrap().times_used, 2);
        assert_eq!(store.coupon(9).unwrap().times_used, 2);
    }

    #[tokio::test]
    async fn test_customer_rule_decrement_without_row_writes_nothing() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 0, 3));
        let updater = store.usage_updater();

        updater
            .execute(Order::new(vec![5], Some(42), None), UsageDirection::Decrement)
            .await
            .unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 2);
        assert!(store.rule_customer(5, 42).is_none());
    }

    #[tokio::test]
    async fn test_customer_rule_decrement_at_zero_writes_nothing() {
        let mut rules = MockRuleRepository::new();
        rules
            .expect_get()
            .returning(|id| Ok(Some(rule(id, 0, 1, 3))));
        rules.expect_load_coupon_code().returning(|_| Ok(()));
        rules
            .expect_save()
            .withf(|rule| rule.times_used == 2)
            .times(1)
            .returning(|_| Ok(()));

        let mut rule_customers = MockRuleCustomerRepository::new();
        rule_customers
            .expect_get_by_customer_rule()
            .times(1)
            .returning(|customer_id, rule_id| {
                Ok(Some(RuleCustomerUsage {
                    rule_id,
                    customer_id,
                    times_used: 0,
                }))
            });
        rule_customers.expect_save().never();

        let updater = UsageUpdater::new(
            Arc::new(rules),
            Arc::new(rule_customers),
            Arc::new(MockCouponRepository::new()),
            CouponUsageStore::new(Arc::new(MockCouponUsageRepository::new())),
        );

        updater
            .execute(Order::new(vec![5], Some(42), None), UsageDirection::Decrement)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_customer_rule_row_at_zero_stays_at_zero() {
        let store = InMemoryUsageStore::new();
        store.insert_rule(rule(5, 0, 1, 1));
        store.put_rule_customer(RuleCustomerUsage {
            rule_id: 5,
            customer_id: 42,
            times_used: 0,
        });

        store
            .usage_updater()
            .execute(Order::new(vec![5], Some(42), None), UsageDirection::Decrement)
            .await
            .unwrap();

        assert_eq!(store.rule(5).unwrap().times_used, 0);
        assert_eq!(store.rule_customer(5, 42).unwrap().times_used, 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_aborts_processing() {
        let mut rules = MockRuleRepository::new();
        rules
            .expect_get()
            .times(1)
            .returning(|_| Err(CoreError::persistence("database is locked")));
        let mut coupons = MockCouponRepository::new();
        coupons.expect_get_by_code().never();

        let updater = UsageUpdater::new(
            Arc::new(rules),
            Arc::new(MockRuleCustomerRepository::new()),
            Arc::new(coupons),
            CouponUsageStore::new(Arc::new(MockCouponUsageRepository::new())),
        );

        let order = Order::new(vec![5, 7], Some(42), Some("SAVE10".to_string()));
        let err = updater
            .execute(order, UsageDirection::Increment)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_rule_coupon_code_is_loaded_before_save() {
        let mut rules = MockRuleRepository::new();
        rules
            .expect_get()
            .returning(|id| Ok(Some(rule(id, 0, 0, 0))));
        rules.expect_load_coupon_code().times(1).returning(|rule| {
            rule.coupon_code = Some("SAVE10".to_string());
            Ok(())
        });
        rules
            .expect_save()
            .withf(|rule| rule.times_used == 1 && rule.coupon_code.as_deref() == Some("SAVE10"))
            .times(1)
            .returning(|_| Ok(()));

        let updater = UsageUpdater::new(
            Arc::new(rules),
            Arc::new(MockRuleCustomerRepository::new()),
            Arc::new(MockCouponRepository::new()),
            CouponUsageStore::new(Arc::new(MockCouponUsageRepository::new())),
        );

        updater
            .execute(Order::new(vec![5], None, None), UsageDirection::Increment)
            .await
            .unwrap();
    }
}
