//! 告警触发服务
//!
//! 按配置的间隔执行评估周期，收到 Ctrl+C / SIGTERM 后等待当前周期结束再退出。

use std::sync::Arc;

use alarm_engine::repository::{FiringRepository, RuleRepository, ValueRepository};
use alarm_engine::{
    AlarmEngine, EmailNotifier, EvaluationWorker, LogNotifier, MIGRATOR, Notifier,
};
use alarm_shared::config::AppConfig;
use alarm_shared::database::Database;
use alarm_shared::observability;
use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 统一加载配置：config/*.toml + ALARM_ 前缀环境变量
    let config = AppConfig::load("alarm-trigger").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        interval = ?config.evaluation_interval(),
        "Starting alarm-trigger service..."
    );

    let db = Database::connect(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations(&MIGRATOR).await?;
    }

    let notifier = build_notifier(&config)?;
    info!(notifier = notifier.name(), "Notifier initialized");

    let pool = db.pool().clone();
    let engine = AlarmEngine::new(
        Arc::new(RuleRepository::new(pool.clone())),
        Arc::new(ValueRepository::new(pool.clone())),
        Arc::new(FiringRepository::new(pool)),
        notifier,
    );
    let worker = EvaluationWorker::new(Arc::new(engine), config.evaluation_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    worker_handle.await?;

    db.close().await;
    info!("Service shutdown complete");
    Ok(())
}

/// 配置了 SMTP 主机时使用邮件通知，否则只写日志
fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    match &config.email {
        Some(email) if email.host().is_some() => {
            Ok(Arc::new(EmailNotifier::new(email.clone())?))
        }
        _ => Ok(Arc::new(LogNotifier)),
    }
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
