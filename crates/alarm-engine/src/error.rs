//! 告警引擎错误类型
//!
//! 比较错误（CompareError）只在条件比较器内部流转，最终被收敛为“条件不满足”；
//! 其余错误（AlarmError）用于加载数据和执行副作用。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("规则未找到: {0}")]
    RuleNotFound(i64),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("邮件地址无效: {0}")]
    EmailAddress(#[from] lettre::address::AddressError),

    #[error("SMTP 发送失败: {0}")]
    EmailTransport(#[from] lettre::transport::smtp::Error),
}

impl AlarmError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::Notification(_) => "NOTIFICATION_ERROR",
            Self::EmailAddress(_) => "EMAIL_ADDRESS_ERROR",
            Self::EmailTransport(_) => "EMAIL_TRANSPORT_ERROR",
        }
    }

    /// 是否为可重试错误（下一个评估周期可能成功）
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::EmailTransport(_))
    }
}

pub type Result<T> = std::result::Result<T, AlarmError>;

/// 条件比较错误
///
/// 比较器对外永远返回 bool，这里的错误只用于诊断日志。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompareError {
    #[error("无法将字面量 '{literal}' 解析为 {kind}")]
    InvalidLiteral { literal: String, kind: &'static str },

    #[error("操作符 '{operator}' 不支持类型 {kind}")]
    UnsupportedOperator { operator: String, kind: &'static str },

    #[error("类型 {0} 不支持比较")]
    UnsupportedKind(&'static str),
}
