//! 告警通知
//!
//! 通过 `Notifier` trait 抽象通知渠道，编排器只在抢占成功后调用一次。
//! 通知失败只记录日志，不回滚已经持久化的 armed 标记。

mod email;

pub use email::{Delivery, EmailNotifier, SkipReason};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::models::Rule;

/// 通知渠道 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 渠道名称，用于日志和指标标签
    fn name(&self) -> &'static str;

    /// 发送一次告警通知
    async fn notify(&self, rule: &Rule, fired_at: DateTime<Utc>) -> Result<()>;
}

/// 仅写日志的通知器
///
/// 未配置 SMTP 时使用，保证触发事件至少在日志中可见
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, rule: &Rule, fired_at: DateTime<Utc>) -> Result<()> {
        info!(
            rule_id = rule.id,
            rule_name = %rule.name,
            message = %rule.message,
            fired_at = %fired_at,
            "告警触发"
        );
        Ok(())
    }
}

/// 解析收件人列表
///
/// 支持分号、逗号和换行分隔；忽略空项，按首次出现顺序去重（不区分大小写）。
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();

    for entry in raw.split([';', ',', '\n', '\r']) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if recipients.iter().any(|r| r.eq_ignore_ascii_case(entry)) {
            continue;
        }
        recipients.push(entry.to_string());
    }

    recipients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients_separators() {
        let parsed = parse_recipients("a@x.com; b@x.com,c@x.com\r\nd@x.com");
        assert_eq!(parsed, vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
    }

    #[test]
    fn test_parse_recipients_dedup_keeps_first() {
        let parsed = parse_recipients("Ops@X.com;ops@x.com; dev@x.com ;;OPS@x.COM");
        assert_eq!(parsed, vec!["Ops@X.com", "dev@x.com"]);
    }

    #[test]
    fn test_parse_recipients_empty() {
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients(" ;,\n ").is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let rule = Rule::new(1, "boiler", "over temperature");
        assert!(LogNotifier.notify(&rule, Utc::now()).await.is_ok());
        assert_eq!(LogNotifier.name(), "log");
    }
}
