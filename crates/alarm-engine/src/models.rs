//! 告警引擎领域模型

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 测量值类型
///
/// 判别值与 measurement_values.value_type 列一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer = 1,
    Decimal = 2,
    Text = 3,
    Binary = 4,
    Boolean = 5,
}

impl ValueKind {
    /// 从数据库类型编号转换，未知编号返回 None
    pub fn from_type_id(type_id: i32) -> Option<Self> {
        match type_id {
            1 => Some(Self::Integer),
            2 => Some(Self::Decimal),
            3 => Some(Self::Text),
            4 => Some(Self::Binary),
            5 => Some(Self::Boolean),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 测量值读数，类型与载荷一一对应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Integer(i64),
    Decimal(f64),
    Text(String),
    Binary(Vec<u8>),
    Boolean(bool),
}

impl Reading {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Text(_) => ValueKind::Text,
            Self::Binary(_) => ValueKind::Binary,
            Self::Boolean(_) => ValueKind::Boolean,
        }
    }
}

/// 当前测量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub id: i64,
    pub reading: Reading,
}

impl Value {
    pub fn new(id: i64, reading: Reading) -> Self {
        Self { id, reading }
    }

    pub fn integer(id: i64, value: i64) -> Self {
        Self::new(id, Reading::Integer(value))
    }

    pub fn decimal(id: i64, value: f64) -> Self {
        Self::new(id, Reading::Decimal(value))
    }

    pub fn text(id: i64, value: impl Into<String>) -> Self {
        Self::new(id, Reading::Text(value.into()))
    }

    pub fn boolean(id: i64, value: bool) -> Self {
        Self::new(id, Reading::Boolean(value))
    }

    pub fn binary(id: i64, value: Vec<u8>) -> Self {
        Self::new(id, Reading::Binary(value))
    }

    pub fn kind(&self) -> ValueKind {
        self.reading.kind()
    }
}

/// 一个评估周期内的全部测量值，按 value id 索引
pub type ValueMap = HashMap<i64, Value>;

/// 规则条件：`[value_id] operator literal`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i64,
    pub rule_id: i64,
    pub value_id: i64,
    /// 操作符符号，评估时解析
    pub operator: String,
    /// 文本形式的字面量，按测量值类型解析
    pub literal: String,
}

impl Condition {
    pub fn new(
        id: i64,
        rule_id: i64,
        value_id: i64,
        operator: impl Into<String>,
        literal: impl Into<String>,
    ) -> Self {
        Self {
            id,
            rule_id,
            value_id,
            operator: operator.into(),
            literal: literal.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.value_id, self.operator, self.literal)
    }
}

/// 告警规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub message: String,
    pub active: bool,
    /// 持续匹配多少分钟后才允许触发，同时也是同一段匹配内两次触发的最小间隔
    pub interval_minutes: i32,
    /// 持久化的“已触发”标记，是跨进程重启的唯一锚点
    pub armed: bool,
    pub send_email: bool,
    /// 原始收件人列表（分号、逗号或换行分隔）
    pub email_to: Option<String>,
    /// 生效时间窗（本地时间），两端均为空表示全天生效
    pub time_start: Option<NaiveTime>,
    pub time_end: Option<NaiveTime>,
}

impl Rule {
    pub fn new(id: i64, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            message: message.into(),
            active: true,
            interval_minutes: 0,
            armed: false,
            send_email: false,
            email_to: None,
            time_start: None,
            time_end: None,
        }
    }

    pub fn with_interval(mut self, minutes: i32) -> Self {
        self.interval_minutes = minutes;
        self
    }

    pub fn with_email(mut self, email_to: impl Into<String>) -> Self {
        self.send_email = true;
        self.email_to = Some(email_to.into());
        self
    }

    pub fn with_window(mut self, start: Option<NaiveTime>, end: Option<NaiveTime>) -> Self {
        self.time_start = start;
        self.time_end = end;
        self
    }

    /// 持续匹配门槛，非正数视为立即满足
    pub fn sustain_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes.max(0)))
    }

    /// 判断给定本地时间是否处于生效时间窗内
    ///
    /// 时间窗为左闭右开；start > end 表示跨越午夜；只配置一端时另一端不设限。
    pub fn is_within_window(&self, local_time: NaiveTime) -> bool {
        match (self.time_start, self.time_end) {
            (None, None) => true,
            (Some(start), None) => local_time >= start,
            (None, Some(end)) => local_time < end,
            (Some(start), Some(end)) if start == end => true,
            (Some(start), Some(end)) if start < end => local_time >= start && local_time < end,
            (Some(start), Some(end)) => local_time >= start || local_time < end,
        }
    }
}

/// 触发记录（只追加）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringRecord {
    pub id: i64,
    pub rule_id: i64,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}
