//! 内存存储
//!
//! 在同一进程内实现全部仓储接口，用于测试和不连接数据库的演练运行。
//! try_claim 在 DashMap 分片写锁内完成读取与写入，等价于数据库的单行条件更新。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use super::traits::{FiringRepositoryTrait, RuleRepositoryTrait, ValueRepositoryTrait};
use crate::error::{AlarmError, Result};
use crate::models::{Condition, FiringRecord, Rule, Value, ValueMap};

/// 内存告警存储
#[derive(Default)]
pub struct InMemoryAlarmStore {
    rules: DashMap<i64, Rule>,
    conditions: DashMap<i64, Vec<Condition>>,
    values: RwLock<ValueMap>,
    firings: Mutex<Vec<FiringRecord>>,
    next_firing_id: AtomicI64,
}

impl InMemoryAlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_rule(&self, rule: Rule) {
        self.rules.insert(rule.id, rule);
    }

    pub fn add_condition(&self, condition: Condition) {
        self.conditions
            .entry(condition.rule_id)
            .or_default()
            .push(condition);
    }

    pub fn set_value(&self, value: Value) {
        self.values.write().insert(value.id, value);
    }

    pub fn remove_value(&self, value_id: i64) {
        self.values.write().remove(&value_id);
    }

    /// 规则当前快照
    pub fn rule(&self, rule_id: i64) -> Option<Rule> {
        self.rules.get(&rule_id).map(|r| r.value().clone())
    }

    pub fn is_armed(&self, rule_id: i64) -> bool {
        self.rules.get(&rule_id).is_some_and(|r| r.armed)
    }

    /// 全部触发记录（按写入顺序）
    pub fn firings(&self) -> Vec<FiringRecord> {
        self.firings.lock().clone()
    }

    pub fn firing_count(&self, rule_id: i64) -> usize {
        self.firings
            .lock()
            .iter()
            .filter(|f| f.rule_id == rule_id)
            .count()
    }
}

#[async_trait]
impl RuleRepositoryTrait for InMemoryAlarmStore {
    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn list_conditions(&self, rule_id: i64) -> Result<Vec<Condition>> {
        Ok(self
            .conditions
            .get(&rule_id)
            .map(|c| c.value().clone())
            .unwrap_or_default())
    }

    async fn try_claim(&self, rule_id: i64) -> Result<bool> {
        let mut rule = self
            .rules
            .get_mut(&rule_id)
            .ok_or(AlarmError::RuleNotFound(rule_id))?;

        if rule.armed {
            return Ok(false);
        }
        rule.armed = true;
        Ok(true)
    }

    async fn release(&self, rule_id: i64) -> Result<()> {
        let mut rule = self
            .rules
            .get_mut(&rule_id)
            .ok_or(AlarmError::RuleNotFound(rule_id))?;
        rule.armed = false;
        Ok(())
    }

    async fn update_rule(&self, rule: &Rule) -> Result<()> {
        let mut stored = self
            .rules
            .get_mut(&rule.id)
            .ok_or(AlarmError::RuleNotFound(rule.id))?;

        let armed = stored.armed;
        *stored = rule.clone();
        stored.armed = armed;
        Ok(())
    }
}

#[async_trait]
impl ValueRepositoryTrait for InMemoryAlarmStore {
    async fn load_values(&self) -> Result<ValueMap> {
        Ok(self.values.read().clone())
    }
}

#[async_trait]
impl FiringRepositoryTrait for InMemoryAlarmStore {
    async fn record_firing(
        &self,
        rule_id: i64,
        message: &str,
        fired_at: DateTime<Utc>,
    ) -> Result<i64> {
        let id = self.next_firing_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.firings.lock().push(FiringRecord {
            id,
            rule_id,
            message: message.to_string(),
            fired_at,
        });
        Ok(id)
    }

    async fn list_firings(&self, rule_id: i64, limit: i64) -> Result<Vec<FiringRecord>> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .firings
            .lock()
            .iter()
            .rev()
            .filter(|f| f.rule_id == rule_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
