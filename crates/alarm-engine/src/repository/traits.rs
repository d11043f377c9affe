//! 仓储 Trait 定义
//!
//! 定义仓储接口，评估引擎依赖抽象而非具体存储技术，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Condition, FiringRecord, Rule, ValueMap};

/// 告警规则仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleRepositoryTrait: Send + Sync {
    /// 全部规则（含未启用的）
    async fn list_rules(&self) -> Result<Vec<Rule>>;
    async fn list_conditions(&self, rule_id: i64) -> Result<Vec<Condition>>;

    /// 条件抢占：仅当 armed 仍为 false 时置为 true，返回本次调用是否抢占成功
    async fn try_claim(&self, rule_id: i64) -> Result<bool>;
    /// 无条件复位 armed
    async fn release(&self, rule_id: i64) -> Result<()>;

    /// 更新规则的可编辑字段，不修改 armed
    async fn update_rule(&self, rule: &Rule) -> Result<()>;
}

/// 测量值仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ValueRepositoryTrait: Send + Sync {
    async fn load_values(&self) -> Result<ValueMap>;
}

/// 触发记录仓储接口（只追加）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FiringRepositoryTrait: Send + Sync {
    async fn record_firing(
        &self,
        rule_id: i64,
        message: &str,
        fired_at: DateTime<Utc>,
    ) -> Result<i64>;
    async fn list_firings(&self, rule_id: i64, limit: i64) -> Result<Vec<FiringRecord>>;
}
