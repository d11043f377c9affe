//! 数据库连接管理
//!
//! 启动时按指数退避重试建立 PostgreSQL 连接池，连接建立后立即做一次探活。
//! 迁移由持有 migrations 目录的 crate 通过 `sqlx::migrate!` 构造后传入。

use crate::config::DatabaseConfig;
use crate::error::{Result, SharedError};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// 两次连接尝试之间的最长等待
const MAX_CONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// PostgreSQL 连接池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 建立连接池
    ///
    /// 网络类错误按 1s、2s、4s... 退避重试 `connect_retries` 次，其余错误直接返回。
    #[instrument(skip(config), fields(retries = config.connect_retries))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::try_connect(config).await {
                Ok(db) => return Ok(db),
                Err(e) if is_transient(&e) && attempt < config.connect_retries => {
                    let delay = backoff(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database not reachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        let db = Self { pool };
        db.health_check().await?;
        info!(
            max_connections = config.max_connections,
            "Database connection pool ready"
        );
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 探活：执行 `SELECT 1`
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(SharedError::from)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }

    /// 执行内嵌迁移
    #[instrument(skip(self, migrator))]
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        migrator.run(&self.pool).await?;
        info!(
            migrations = migrator.iter().count(),
            "Database migrations applied"
        );
        Ok(())
    }
}

/// 网络类错误可能在数据库就绪后恢复，URL 或认证错误不会
fn is_transient(err: &SharedError) -> bool {
    matches!(
        err,
        SharedError::Database(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
    )
}

/// 第 attempt 次重试前的等待时间（从 0 开始）
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(5)).min(MAX_CONNECT_BACKOFF)
}
