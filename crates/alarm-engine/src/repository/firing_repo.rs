//! 触发记录仓储
//!
//! 每一次真实触发追加一条记录，只增不改，用于审计

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::traits::FiringRepositoryTrait;
use crate::error::Result;
use crate::models::FiringRecord;

/// 触发记录仓储
pub struct FiringRepository {
    pool: PgPool,
}

impl FiringRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FiringRow {
    id: i64,
    rule_id: i64,
    message: String,
    fired_at: DateTime<Utc>,
}

#[async_trait]
impl FiringRepositoryTrait for FiringRepository {
    async fn record_firing(
        &self,
        rule_id: i64,
        message: &str,
        fired_at: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO alarm_firings (rule_id, message, fired_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(rule_id)
        .bind(message)
        .bind(fired_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// 按时间倒序返回最近的 limit 条记录
    async fn list_firings(&self, rule_id: i64, limit: i64) -> Result<Vec<FiringRecord>> {
        let rows = sqlx::query_as::<_, FiringRow>(
            r#"
            SELECT id, rule_id, message, fired_at
            FROM alarm_firings
            WHERE rule_id = $1
            ORDER BY fired_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(rule_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| FiringRecord {
                id: r.id,
                rule_id: r.rule_id,
                message: r.message,
                fired_at: r.fired_at,
            })
            .collect())
    }
}
