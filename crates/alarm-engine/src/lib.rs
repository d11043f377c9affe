//! 告警规则评估与触发引擎
//!
//! 周期性地用当前测量值评估告警规则，提供：
//! - 按测量值类型解析字面量的条件比较
//! - 条件集合的 AND 评估
//! - 持续匹配防抖与 armed 复位的触发状态机
//! - 基于持久化 armed 标记的原子抢占，防止重叠周期重复触发
//! - 邮件 / 日志通知

pub mod condition_set;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod notification;
pub mod operators;
pub mod repository;
pub mod trigger;
pub mod worker;

pub use condition_set::{ConditionOutcome, ConditionSetEvaluator, ConditionSetResult};
pub use engine::{AlarmEngine, CycleReport};
pub use error::{AlarmError, CompareError, Result};
pub use evaluator::ConditionEvaluator;
pub use models::{Condition, FiringRecord, Reading, Rule, Value, ValueKind, ValueMap};
pub use notification::{EmailNotifier, LogNotifier, Notifier};
pub use operators::Operator;
pub use trigger::{TriggerDecision, TriggerEffect, TriggerPhase, TriggerState, decide};
pub use worker::EvaluationWorker;

/// 数据库迁移（alarm_rules / rule_conditions / measurement_values / alarm_firings）
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
