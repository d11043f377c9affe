//! 日志初始化模块
//!
//! 基于 tracing-subscriber 组装日志输出，支持 JSON 与人类可读两种格式。

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use super::ObservabilityConfig;

/// 初始化 tracing 日志
///
/// RUST_LOG 环境变量优先于配置中的 log_level。
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = build_filter(&config.log_level);

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// 固定压低到 warn 的依赖日志
const QUIET_TARGETS: &str = "sqlx=warn,lettre=warn";

fn filter_directives(log_level: &str) -> String {
    format!("{log_level},{QUIET_TARGETS}")
}

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(log_level)))
        .unwrap_or_else(|_| EnvFilter::new(filter_directives("info")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_quiet_sqlx() {
        assert_eq!(filter_directives("debug"), "debug,sqlx=warn,lettre=warn");
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // 非法的过滤表达式不会 panic
        let _ = build_filter("[[not a filter");
    }
}
