//! 条件比较器
//!
//! 按测量值类型解析条件字面量并执行比较。比较器是纯函数：
//! 相同的 (值, 操作符, 字面量) 永远得到相同结果，不做任何 I/O。
//!
//! 所有解析或类型错误都收敛为 `false`（条件不满足），配置错误的规则绝不会误触发。

use crate::error::CompareError;
use crate::models::{Reading, Value, ValueKind};
use crate::operators::Operator;
use std::cmp::Ordering;

/// 条件比较器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 比较测量值与字面量
    ///
    /// 任何错误都返回 false；需要诊断信息时使用 [`ConditionEvaluator::try_compare`]。
    pub fn compare(value: &Value, operator: &str, literal: &str) -> bool {
        Self::try_compare(value, operator, literal).unwrap_or(false)
    }

    /// 比较测量值与字面量，保留失败原因
    pub fn try_compare(
        value: &Value,
        operator: &str,
        literal: &str,
    ) -> Result<bool, CompareError> {
        let kind = value.kind();
        let op: Operator = operator
            .parse()
            .map_err(|_| Self::unsupported(operator, kind))?;

        match &value.reading {
            Reading::Integer(actual) => {
                let expected = Self::parse_integer(literal)?;
                Ok(Self::ordered(op, actual.cmp(&expected)))
            }
            Reading::Decimal(actual) => {
                let expected = Self::parse_decimal(literal)?;
                Ok(Self::compare_f64(op, *actual, expected))
            }
            Reading::Text(actual) => {
                Self::require_equality(op, operator, kind)?;
                // 序数比较：逐字节、区分大小写，不做 trim
                Ok(Self::equality(op, actual.as_str() == literal))
            }
            Reading::Boolean(actual) => {
                Self::require_equality(op, operator, kind)?;
                let expected = Self::parse_boolean(literal)?;
                Ok(Self::equality(op, *actual == expected))
            }
            Reading::Binary(_) => Err(CompareError::UnsupportedKind(kind.name())),
        }
    }

    /// 整数字面量（允许首尾空白）
    fn parse_integer(literal: &str) -> Result<i64, CompareError> {
        literal
            .trim()
            .parse::<i64>()
            .map_err(|_| Self::invalid_literal(literal, ValueKind::Integer))
    }

    /// 小数字面量，固定使用 `.` 作为小数点，与区域设置无关
    fn parse_decimal(literal: &str) -> Result<f64, CompareError> {
        literal
            .trim()
            .parse::<f64>()
            .map_err(|_| Self::invalid_literal(literal, ValueKind::Decimal))
    }

    /// 布尔字面量：`1`/`0` 或不区分大小写的 `true`/`false`
    fn parse_boolean(literal: &str) -> Result<bool, CompareError> {
        let trimmed = literal.trim();
        match trimmed {
            "1" => Ok(true),
            "0" => Ok(false),
            _ if trimmed.eq_ignore_ascii_case("true") => Ok(true),
            _ if trimmed.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(Self::invalid_literal(literal, ValueKind::Boolean)),
        }
    }

    /// 有序比较
    fn ordered(op: Operator, ordering: Ordering) -> bool {
        match op {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Neq => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
        }
    }

    /// 浮点比较，直接使用 IEEE 754 语义（NaN 与任何值比较都不相等）
    fn compare_f64(op: Operator, actual: f64, expected: f64) -> bool {
        match op {
            Operator::Eq => actual == expected,
            Operator::Neq => actual != expected,
            Operator::Gt => actual > expected,
            Operator::Gte => actual >= expected,
            Operator::Lt => actual < expected,
            Operator::Lte => actual <= expected,
        }
    }

    fn equality(op: Operator, equal: bool) -> bool {
        match op {
            Operator::Neq => !equal,
            _ => equal,
        }
    }

    fn require_equality(op: Operator, symbol: &str, kind: ValueKind) -> Result<(), CompareError> {
        if op.is_equality() {
            Ok(())
        } else {
            Err(Self::unsupported(symbol, kind))
        }
    }

    fn unsupported(symbol: &str, kind: ValueKind) -> CompareError {
        CompareError::UnsupportedOperator {
            operator: symbol.to_string(),
            kind: kind.name(),
        }
    }

    fn invalid_literal(literal: &str, kind: ValueKind) -> CompareError {
        CompareError::InvalidLiteral {
            literal: literal.to_string(),
            kind: kind.name(),
        }
    }
}
