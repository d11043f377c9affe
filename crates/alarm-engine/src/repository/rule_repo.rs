//! 告警规则仓储
//!
//! 规则与条件的读取，以及 armed 标记的条件抢占 / 复位

use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::traits::RuleRepositoryTrait;
use crate::error::{AlarmError, Result};
use crate::models::{Condition, Rule};

/// 告警规则仓储
pub struct RuleRepository {
    pool: PgPool,
}

/// alarm_rules 表行
#[derive(sqlx::FromRow)]
struct RuleRow {
    id: i64,
    name: String,
    message: Option<String>,
    active: bool,
    interval_minutes: i32,
    armed: bool,
    send_email: bool,
    email_to: Option<String>,
    time_start: Option<NaiveTime>,
    time_end: Option<NaiveTime>,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            message: row.message.unwrap_or_default(),
            active: row.active,
            interval_minutes: row.interval_minutes,
            armed: row.armed,
            send_email: row.send_email,
            email_to: row.email_to,
            time_start: row.time_start,
            time_end: row.time_end,
        }
    }
}

/// rule_conditions 表行
#[derive(sqlx::FromRow)]
struct ConditionRow {
    id: i64,
    rule_id: i64,
    value_id: i64,
    operator: String,
    literal: String,
}

impl From<ConditionRow> for Condition {
    fn from(row: ConditionRow) -> Self {
        Self {
            id: row.id,
            rule_id: row.rule_id,
            value_id: row.value_id,
            operator: row.operator,
            literal: row.literal,
        }
    }
}

impl RuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 ID 查询规则
    pub async fn get_rule(&self, rule_id: i64) -> Result<Option<Rule>> {
        let row = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, message, active, interval_minutes, armed,
                   send_email, email_to, time_start, time_end
            FROM alarm_rules
            WHERE id = $1
            "#,
        )
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Rule::from))
    }
}

#[async_trait]
impl RuleRepositoryTrait for RuleRepository {
    #[instrument(skip(self))]
    async fn list_rules(&self) -> Result<Vec<Rule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, name, message, active, interval_minutes, armed,
                   send_email, email_to, time_start, time_end
            FROM alarm_rules
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Rule::from).collect())
    }

    async fn list_conditions(&self, rule_id: i64) -> Result<Vec<Condition>> {
        let rows = sqlx::query_as::<_, ConditionRow>(
            r#"
            SELECT id, rule_id, value_id, operator, literal
            FROM rule_conditions
            WHERE rule_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(rule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Condition::from).collect())
    }

    /// 单行条件更新实现比较并交换：只有 armed 仍为 FALSE 的那一次 UPDATE 会命中行
    #[instrument(skip(self))]
    async fn try_claim(&self, rule_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE alarm_rules
            SET armed = TRUE, updated_at = NOW()
            WHERE id = $1 AND armed = FALSE
            "#,
        )
        .bind(rule_id)
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(rule_id, claimed, "armed 抢占完成");
        Ok(claimed)
    }

    #[instrument(skip(self))]
    async fn release(&self, rule_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE alarm_rules
            SET armed = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(rule_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, rule), fields(rule_id = rule.id))]
    async fn update_rule(&self, rule: &Rule) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE alarm_rules
            SET name = $2, message = $3, active = $4, send_email = $5, email_to = $6,
                time_start = $7, time_end = $8, interval_minutes = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.message)
        .bind(rule.active)
        .bind(rule.send_email)
        .bind(&rule.email_to)
        .bind(rule.time_start)
        .bind(rule.time_end)
        .bind(rule.interval_minutes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AlarmError::RuleNotFound(rule.id));
        }

        Ok(())
    }
}
