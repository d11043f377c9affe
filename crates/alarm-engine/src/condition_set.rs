//! 条件集评估
//!
//! 对一条规则的全部条件逐一求值（不短路），保留每个条件的结果以便诊断，
//! 规则整体匹配 = 所有条件均满足。空条件列表视为匹配。

use crate::error::CompareError;
use crate::evaluator::ConditionEvaluator;
use crate::models::{Condition, ValueMap};
use tracing::{debug, warn};

/// 单个条件的评估结果
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOutcome {
    Satisfied,
    NotSatisfied,
    /// 字面量无法解析或操作符不支持，按不满足处理
    Invalid(CompareError),
    /// 条件引用的测量值在本周期不存在
    MissingValue,
}

impl ConditionOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// 诊断输出使用的短标记
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Satisfied => "ok",
            Self::NotSatisfied => "fail",
            Self::Invalid(_) => "invalid",
            Self::MissingValue => "missing",
        }
    }
}

/// 条件结果
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionResult {
    pub condition_id: i64,
    pub value_id: i64,
    pub outcome: ConditionOutcome,
}

/// 规则全部条件的评估结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSetResult {
    pub results: Vec<ConditionResult>,
}

impl ConditionSetResult {
    /// 规则是否匹配（逻辑与）
    pub fn matched(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_satisfied())
    }

    /// 缺失测量值的条件数量
    pub fn missing_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == ConditionOutcome::MissingValue)
            .count()
    }

    /// 评估轨迹，如 `#12[7]=ok #13[8]=missing`
    pub fn trace(&self) -> String {
        self.results
            .iter()
            .map(|r| format!("#{}[{}]={}", r.condition_id, r.value_id, r.outcome.marker()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 条件集评估器
pub struct ConditionSetEvaluator;

impl ConditionSetEvaluator {
    pub fn evaluate(rule_id: i64, conditions: &[Condition], values: &ValueMap) -> ConditionSetResult {
        let results = conditions
            .iter()
            .map(|condition| ConditionResult {
                condition_id: condition.id,
                value_id: condition.value_id,
                outcome: Self::evaluate_one(rule_id, condition, values),
            })
            .collect();

        ConditionSetResult { results }
    }

    fn evaluate_one(rule_id: i64, condition: &Condition, values: &ValueMap) -> ConditionOutcome {
        let Some(value) = values.get(&condition.value_id) else {
            debug!(
                rule_id,
                condition_id = condition.id,
                value_id = condition.value_id,
                "条件引用的测量值不存在"
            );
            return ConditionOutcome::MissingValue;
        };

        match ConditionEvaluator::try_compare(value, &condition.operator, &condition.literal) {
            Ok(true) => ConditionOutcome::Satisfied,
            Ok(false) => ConditionOutcome::NotSatisfied,
            Err(e) => {
                warn!(
                    rule_id,
                    condition_id = condition.id,
                    value_id = condition.value_id,
                    condition = %condition,
                    error = %e,
                    "条件比较失败，按不满足处理"
                );
                ConditionOutcome::Invalid(e)
            }
        }
    }
}
