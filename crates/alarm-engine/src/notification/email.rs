//! SMTP 邮件通知
//!
//! 使用 lettre 的异步 SMTP 传输发送纯文本告警邮件。传输层在启动时构建一次，
//! 连接池由 lettre 管理。

use alarm_shared::config::EmailConfig;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use super::{Notifier, parse_recipients};
use crate::error::{AlarmError, Result};
use crate::models::Rule;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 邮件通知器
pub struct EmailNotifier {
    config: EmailConfig,
    /// 未配置 SMTP 主机时为空
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let transport = match config.host() {
            Some(host) => Some(build_transport(&config, host)?),
            None => None,
        };
        Ok(Self { config, transport })
    }

    /// 邮件主题，配置了前缀时以空格连接
    pub fn subject(&self, rule: &Rule) -> String {
        let subject = format!("告警触发: {}", rule.name);
        let prefix = self.config.subject_prefix.trim();
        if prefix.is_empty() {
            subject
        } else {
            format!("{prefix} {subject}")
        }
    }

    /// 纯文本邮件正文
    pub fn body(rule: &Rule, fired_at: DateTime<Utc>) -> String {
        format!(
            "告警规则: {}\n告警信息: {}\n触发时间: {}\n",
            rule.name,
            rule.message,
            fired_at.with_timezone(&Local).format(TIME_FORMAT)
        )
    }

    fn build_message(
        &self,
        sender: &str,
        recipients: &[Mailbox],
        rule: &Rule,
        fired_at: DateTime<Utc>,
    ) -> Result<Message> {
        let mut builder = Message::builder()
            .from(sender.parse::<Mailbox>()?)
            .subject(self.subject(rule))
            .header(ContentType::TEXT_PLAIN);
        for recipient in recipients {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(Self::body(rule, fired_at))
            .map_err(|e| AlarmError::Notification(e.to_string()))
    }
}

fn build_transport(
    config: &EmailConfig,
    host: &str,
) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if config.enable_ssl {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
    };
    let mut builder = builder.port(config.smtp_port);

    if let Some((user, pass)) = config.credentials() {
        builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
    }

    Ok(builder.build())
}

/// 解析收件人地址，无效地址跳过
fn to_mailboxes(rule_id: i64, recipients: &[String]) -> Vec<Mailbox> {
    recipients
        .iter()
        .filter_map(|r| match r.parse::<Mailbox>() {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                warn!(rule_id, recipient = %r, error = %e, "收件人地址无效，已跳过");
                None
            }
        })
        .collect()
}

/// 未发送邮件的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 全局关闭了邮件通知
    Disabled,
    /// 规则未开启邮件通知
    OptedOut,
    /// 没有可用的收件人地址
    NoRecipients,
    NoHost,
    NoSender,
}

impl SkipReason {
    fn describe(self) -> &'static str {
        match self {
            Self::Disabled => "邮件通知已禁用",
            Self::OptedOut => "规则未开启邮件通知",
            Self::NoRecipients => "规则没有有效的收件人",
            Self::NoHost => "未配置 SMTP 主机",
            Self::NoSender => "未配置发件人",
        }
    }
}

/// 一次邮件投递的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 已发送，附带收件人数量
    Sent(usize),
    Skipped(SkipReason),
}

impl EmailNotifier {
    /// 按配置和规则决定是否发送，发送失败返回错误
    pub async fn deliver(&self, rule: &Rule, fired_at: DateTime<Utc>) -> Result<Delivery> {
        if !self.config.enabled {
            return Ok(Delivery::Skipped(SkipReason::Disabled));
        }
        if !rule.send_email {
            return Ok(Delivery::Skipped(SkipReason::OptedOut));
        }

        let recipients = to_mailboxes(
            rule.id,
            &parse_recipients(rule.email_to.as_deref().unwrap_or_default()),
        );
        if recipients.is_empty() {
            return Ok(Delivery::Skipped(SkipReason::NoRecipients));
        }
        let Some(transport) = &self.transport else {
            return Ok(Delivery::Skipped(SkipReason::NoHost));
        };
        let Some(sender) = self.config.sender() else {
            return Ok(Delivery::Skipped(SkipReason::NoSender));
        };

        let message = self.build_message(sender, &recipients, rule, fired_at)?;
        transport.send(message).await?;
        Ok(Delivery::Sent(recipients.len()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, rule: &Rule, fired_at: DateTime<Utc>) -> Result<()> {
        match self.deliver(rule, fired_at).await? {
            Delivery::Sent(recipients) => {
                info!(rule_id = rule.id, recipients, "告警邮件已发送");
            }
            Delivery::Skipped(reason @ (SkipReason::Disabled | SkipReason::OptedOut)) => {
                debug!(rule_id = rule.id, reason = reason.describe(), "跳过邮件通知");
            }
            Delivery::Skipped(reason) => {
                warn!(rule_id = rule.id, reason = reason.describe(), "跳过邮件通知");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: Some("localhost".to_string()),
            from: Some("alarm@example.com".to_string()),
            ..Default::default()
        }
    }

    fn rule() -> Rule {
        Rule::new(3, "锅炉温度", "温度超过 40 度").with_email("ops@example.com")
    }

    #[test]
    fn test_subject_without_prefix() {
        let notifier = EmailNotifier::new(config()).unwrap();
        assert_eq!(notifier.subject(&rule()), "告警触发: 锅炉温度");
    }

    #[test]
    fn test_subject_with_prefix() {
        let notifier = EmailNotifier::new(EmailConfig {
            subject_prefix: "[生产]".to_string(),
            ..config()
        })
        .unwrap();
        assert_eq!(notifier.subject(&rule()), "[生产] 告警触发: 锅炉温度");
    }

    #[test]
    fn test_body_contains_rule_and_time() {
        let fired_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 15).unwrap();
        let body = EmailNotifier::body(&rule(), fired_at);

        let local = fired_at.with_timezone(&Local).format(TIME_FORMAT).to_string();
        assert!(body.contains("告警规则: 锅炉温度"));
        assert!(body.contains("告警信息: 温度超过 40 度"));
        assert!(body.contains(&format!("触发时间: {local}")));
    }

    #[test]
    fn test_build_message_with_all_recipients() {
        let notifier = EmailNotifier::new(config()).unwrap();
        let recipients = to_mailboxes(
            3,
            &parse_recipients("ops@example.com; not an address; dev@example.com"),
        );
        assert_eq!(recipients.len(), 2);

        let message = notifier
            .build_message("alarm@example.com", &recipients, &rule(), Utc::now())
            .unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn test_invalid_sender_is_error() {
        let notifier = EmailNotifier::new(config()).unwrap();
        let recipients = to_mailboxes(3, &["ops@example.com".to_string()]);
        let err = notifier
            .build_message("nobody", &recipients, &rule(), Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "EMAIL_ADDRESS_ERROR");
    }

    #[tokio::test]
    async fn test_skips_when_disabled() {
        let notifier = EmailNotifier::new(EmailConfig {
            enabled: false,
            ..config()
        })
        .unwrap();
        assert_eq!(
            notifier.deliver(&rule(), Utc::now()).await.unwrap(),
            Delivery::Skipped(SkipReason::Disabled)
        );
        assert!(notifier.notify(&rule(), Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_skips_when_rule_opted_out() {
        let notifier = EmailNotifier::new(config()).unwrap();
        let rule = Rule::new(3, "r", "m");
        assert_eq!(
            notifier.deliver(&rule, Utc::now()).await.unwrap(),
            Delivery::Skipped(SkipReason::OptedOut)
        );
    }

    #[tokio::test]
    async fn test_skips_without_recipients() {
        let notifier = EmailNotifier::new(config()).unwrap();
        let rule = Rule::new(3, "r", "m").with_email(" ; ,");
        assert_eq!(
            notifier.deliver(&rule, Utc::now()).await.unwrap(),
            Delivery::Skipped(SkipReason::NoRecipients)
        );

        let invalid_only = Rule::new(3, "r", "m").with_email("not an address");
        assert_eq!(
            notifier.deliver(&invalid_only, Utc::now()).await.unwrap(),
            Delivery::Skipped(SkipReason::NoRecipients)
        );
    }

    #[tokio::test]
    async fn test_skips_without_host() {
        let notifier = EmailNotifier::new(EmailConfig {
            smtp_host: None,
            ..config()
        })
        .unwrap();
        assert!(notifier.transport.is_none());
        assert_eq!(
            notifier.deliver(&rule(), Utc::now()).await.unwrap(),
            Delivery::Skipped(SkipReason::NoHost)
        );
    }

    #[tokio::test]
    async fn test_skips_without_sender() {
        let notifier = EmailNotifier::new(EmailConfig {
            from: None,
            username: None,
            ..config()
        })
        .unwrap();
        assert_eq!(
            notifier.deliver(&rule(), Utc::now()).await.unwrap(),
            Delivery::Skipped(SkipReason::NoSender)
        );
    }
}
