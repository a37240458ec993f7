//! In-memory implementation of the usage repositories for testing and development

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::repository::{
    CouponRepository, CouponUsageRepository, RuleCustomerRepository, RuleRepository,
};
use crate::types::{
    Coupon, CouponCustomerUsage, CouponId, CustomerId, Rule, RuleCustomerUsage, RuleId,
};
use crate::usage::{CouponUsageStore, UsageUpdater};

#[derive(Debug, Default)]
struct Tables {
    rules: BTreeMap<RuleId, Rule>,
    rule_customers: HashMap<(RuleId, CustomerId), RuleCustomerUsage>,
    coupons: BTreeMap<CouponId, Coupon>,
    coupon_usage: HashMap<(CouponId, CustomerId), CouponCustomerUsage>,
}

/// All four usage tables behind one lock.
///
/// Clones share the same tables, so one store can be handed to every
/// repository slot of a [`UsageUpdater`] and inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUsageStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// An updater whose repositories all point at this store.
    pub fn usage_updater(&self) -> UsageUpdater {
        UsageUpdater::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            self.coupon_usage_store(),
        )
    }

    pub fn coupon_usage_store(&self) -> CouponUsageStore {
        CouponUsageStore::new(Arc::new(self.clone()))
    }

    // -------------------------------------------------------------------------
    // Seeding and inspection
    // -------------------------------------------------------------------------

    pub fn insert_rule(&self, rule: Rule) {
        self.write_tables().rules.insert(rule.id, rule);
    }

    pub fn insert_coupon(&self, coupon: Coupon) {
        self.write_tables().coupons.insert(coupon.id, coupon);
    }

    pub fn put_rule_customer(&self, usage: RuleCustomerUsage) {
        self.write_tables()
            .rule_customers
            .insert((usage.rule_id, usage.customer_id), usage);
    }

    pub fn put_coupon_usage(&self, usage: CouponCustomerUsage) {
        self.write_tables()
            .coupon_usage
            .insert((usage.coupon_id, usage.customer_id), usage);
    }

    pub fn rule(&self, id: RuleId) -> Option<Rule> {
        self.read_tables().rules.get(&id).cloned()
    }

    pub fn coupon(&self, id: CouponId) -> Option<Coupon> {
        self.read_tables().coupons.get(&id).cloned()
    }

    pub fn rule_customer(
        &self,
        rule_id: RuleId,
        customer_id: CustomerId,
    ) -> Option<RuleCustomerUsage> {
        self.read_tables()
            .rule_customers
            .get(&(rule_id, customer_id))
            .cloned()
    }

    pub fn coupon_usage(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> Option<CouponCustomerUsage> {
        self.read_tables()
            .coupon_usage
            .get(&(coupon_id, customer_id))
            .cloned()
    }

    // A panicking test must not hide the tables from later assertions.
    fn read_tables(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> CoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| CoreError::persistence(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> CoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| CoreError::persistence(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl RuleRepository for InMemoryUsageStore {
    async fn get(&self, id: RuleId) -> CoreResult<Option<Rule>> {
        Ok(self.read()?.rules.get(&id).cloned())
    }

    async fn load_coupon_code(&self, rule: &mut Rule) -> CoreResult<()> {
        let tables = self.read()?;

        rule.coupon_code = tables
            .coupons
            .values()
            .find(|coupon| coupon.rule_id == rule.id && coupon.is_primary)
            .map(|coupon| coupon.code.clone());

        Ok(())
    }

    async fn save(&self, rule: &Rule) -> CoreResult<()> {
        let mut tables = self.write()?;

        let stored = tables
            .rules
            .get_mut(&rule.id)
            .ok_or_else(|| CoreError::persistence(format!("Rule {} not found", rule.id)))?;
        stored.times_used = rule.times_used;

        Ok(())
    }
}

#[async_trait]
impl RuleCustomerRepository for InMemoryUsageStore {
    async fn get_by_customer_rule(
        &self,
        customer_id: CustomerId,
        rule_id: RuleId,
    ) -> CoreResult<Option<RuleCustomerUsage>> {
        Ok(self
            .read()?
            .rule_customers
            .get(&(rule_id, customer_id))
            .cloned())
    }

    async fn save(&self, usage: &RuleCustomerUsage) -> CoreResult<()> {
        self.write()?
            .rule_customers
            .insert((usage.rule_id, usage.customer_id), usage.clone());

        Ok(())
    }
}

#[async_trait]
impl CouponRepository for InMemoryUsageStore {
    async fn get_by_code(&self, code: &str) -> CoreResult<Option<Coupon>> {
        Ok(self
            .read()?
            .coupons
            .values()
            .find(|coupon| coupon.code == code)
            .cloned())
    }

    async fn save(&self, coupon: &Coupon) -> CoreResult<()> {
        let mut tables = self.write()?;

        let stored = tables
            .coupons
            .get_mut(&coupon.id)
            .ok_or_else(|| CoreError::persistence(format!("Coupon {} not found", coupon.id)))?;
        stored.times_used = coupon.times_used;

        Ok(())
    }
}

#[async_trait]
impl CouponUsageRepository for InMemoryUsageStore {
    async fn times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> CoreResult<Option<i64>> {
        Ok(self
            .read()?
            .coupon_usage
            .get(&(coupon_id, customer_id))
            .map(|usage| usage.times_used))
    }

    async fn update_times_used(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
        times_used: i64,
    ) -> CoreResult<()> {
        if let Some(usage) = self.write()?.coupon_usage.get_mut(&(coupon_id, customer_id)) {
            usage.times_used = times_used;
        }

        Ok(())
    }

    async fn insert(&self, usage: &CouponCustomerUsage) -> CoreResult<()> {
        let mut tables = self.write()?;
        let key = (usage.coupon_id, usage.customer_id);

        if tables.coupon_usage.contains_key(&key) {
            return Err(CoreError::persistence(format!(
                "Coupon usage for coupon {} and customer {} already exists",
                usage.coupon_id, usage.customer_id
            )));
        }

        tables.coupon_usage.insert(key, usage.clone());
        Ok(())
    }

    async fn get(
        &self,
        coupon_id: CouponId,
        customer_id: CustomerId,
    ) -> CoreResult<Option<CouponCustomerUsage>> {
        Ok(self
            .read()?
            .coupon_usage
            .get(&(coupon_id, customer_id))
            .cloned())
    }
}
