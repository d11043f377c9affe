//! 评估周期编排器
//!
//! 每个周期：加载规则、条件和测量值，逐条评估规则，交给触发状态机决策，
//! 再执行决策产生的副作用（抢占 / 复位 / 写触发记录 / 通知）。
//!
//! 加载阶段失败时整个周期失败，不做任何状态修改；
//! 副作用失败只影响当前规则，记录日志后继续评估下一条规则。

use std::collections::HashSet;
use std::sync::Arc;

use alarm_shared::observability::metrics as alarm_metrics;
use chrono::{DateTime, Local, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::condition_set::ConditionSetEvaluator;
use crate::error::Result;
use crate::models::{Condition, Rule, ValueMap};
use crate::notification::Notifier;
use crate::repository::{FiringRepositoryTrait, RuleRepositoryTrait, ValueRepositoryTrait};
use crate::trigger::{self, TriggerEffect, TriggerPhase, TriggerState};

/// 单个评估周期的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub rules_evaluated: usize,
    pub matched: usize,
    pub fired: usize,
    pub released: usize,
    /// 抢占时发现 armed 已被其他评估实例置位
    pub claims_lost: usize,
    /// 副作用执行失败次数
    pub failures: usize,
}

type RuleWithConditions = (Rule, Vec<Condition>);

/// 告警评估引擎
///
/// 进程内只保存每条规则当前连续匹配段的起始时间；
/// armed 每个周期都从规则行重新读取。
pub struct AlarmEngine {
    rules: Arc<dyn RuleRepositoryTrait>,
    values: Arc<dyn ValueRepositoryTrait>,
    firings: Arc<dyn FiringRepositoryTrait>,
    notifier: Arc<dyn Notifier>,
    episodes: DashMap<i64, DateTime<Utc>>,
}

impl AlarmEngine {
    pub fn new(
        rules: Arc<dyn RuleRepositoryTrait>,
        values: Arc<dyn ValueRepositoryTrait>,
        firings: Arc<dyn FiringRepositoryTrait>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            rules,
            values,
            firings,
            notifier,
            episodes: DashMap::new(),
        }
    }

    /// 某条规则当前连续匹配段的起始时间
    pub fn match_started_at(&self, rule_id: i64) -> Option<DateTime<Utc>> {
        self.episodes.get(&rule_id).map(|t| *t)
    }

    /// 以当前时间执行一个评估周期
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// 以指定时间执行一个评估周期
    #[instrument(skip(self))]
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let (rules, values) = self.load(now).await?;

        let local_time = now.with_timezone(&Local).time();
        let mut report = CycleReport::default();

        for (rule, conditions) in &rules {
            let matched = if rule.is_within_window(local_time) {
                let result = ConditionSetEvaluator::evaluate(rule.id, conditions, &values);
                debug!(rule_id = rule.id, trace = %result.trace(), "条件评估");
                result.matched()
            } else {
                debug!(rule_id = rule.id, "不在生效时间窗内");
                false
            };

            alarm_metrics::record_rule_evaluation(matched);
            report.rules_evaluated += 1;
            if matched {
                report.matched += 1;
            }

            self.step(rule, matched, now, &mut report).await;
        }

        Ok(report)
    }

    /// 加载本周期需要的全部数据
    ///
    /// 任何一步失败都直接返回错误，此时尚未修改任何状态。
    async fn load(&self, now: DateTime<Utc>) -> Result<(Vec<RuleWithConditions>, ValueMap)> {
        let rules: Vec<Rule> = self
            .rules
            .list_rules()
            .await?
            .into_iter()
            .filter(|r| r.active)
            .collect();
        let values = self.values.load_values().await?;

        let mut loaded = Vec::with_capacity(rules.len());
        for rule in rules {
            let conditions = self.rules.list_conditions(rule.id).await?;
            loaded.push((rule, conditions));
        }

        // 停用或删除的规则不再保留匹配段
        let active: HashSet<i64> = loaded.iter().map(|(r, _)| r.id).collect();
        self.episodes.retain(|id, _| active.contains(id));

        debug!(
            rules = loaded.len(),
            values = values.len(),
            now = %now,
            "周期数据加载完成"
        );
        Ok((loaded, values))
    }

    /// 推进单条规则的状态并执行副作用
    async fn step(
        &self,
        rule: &Rule,
        matched: bool,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let previous = TriggerState::new(self.match_started_at(rule.id), rule.armed);
        let decision = trigger::decide(previous, matched, now, rule.sustain_duration());

        if let TriggerPhase::Accumulating { remaining } = decision.phase {
            debug!(
                rule_id = rule.id,
                remaining_secs = remaining.num_seconds(),
                "持续匹配中"
            );
        }

        for effect in &decision.effects {
            match effect {
                TriggerEffect::Release => self.release(rule, report).await,
                TriggerEffect::ClaimAndFire => self.claim_and_fire(rule, now, report).await,
            }
        }

        // 抢占失败或出错时保留匹配段起点，下个周期重新尝试
        match decision.next.match_started_at {
            Some(started_at) => {
                self.episodes.insert(rule.id, started_at);
            }
            None => {
                self.episodes.remove(&rule.id);
            }
        }
    }

    async fn release(&self, rule: &Rule, report: &mut CycleReport) {
        match self.rules.release(rule.id).await {
            Ok(()) => {
                report.released += 1;
                alarm_metrics::record_alarm_released(rule.id);
                info!(rule_id = rule.id, rule_name = %rule.name, "条件恢复，告警复位");
            }
            Err(e) => {
                // armed 仍为 true，下个周期不匹配时会再次复位
                report.failures += 1;
                alarm_metrics::record_side_effect_failure("release");
                error!(rule_id = rule.id, error = %e, "告警复位失败");
            }
        }
    }

    async fn claim_and_fire(&self, rule: &Rule, now: DateTime<Utc>, report: &mut CycleReport) {
        match self.rules.try_claim(rule.id).await {
            Ok(true) => {}
            Ok(false) => {
                report.claims_lost += 1;
                alarm_metrics::record_claim_lost(rule.id);
                info!(rule_id = rule.id, "armed 已被置位，本周期不再触发");
                return;
            }
            Err(e) => {
                report.failures += 1;
                alarm_metrics::record_side_effect_failure("claim");
                error!(rule_id = rule.id, error = %e, "armed 抢占失败");
                return;
            }
        }

        // 抢占成功后 armed 已持久化，后续失败不回滚
        report.fired += 1;
        alarm_metrics::record_alarm_fired(rule.id);
        info!(
            rule_id = rule.id,
            rule_name = %rule.name,
            message = %rule.message,
            "告警触发"
        );

        if let Err(e) = self.firings.record_firing(rule.id, &rule.message, now).await {
            report.failures += 1;
            alarm_metrics::record_side_effect_failure("record_firing");
            error!(rule_id = rule.id, error = %e, "写入触发记录失败");
        }

        if let Err(e) = self.notifier.notify(rule, now).await {
            report.failures += 1;
            alarm_metrics::record_side_effect_failure("notify");
            warn!(
                rule_id = rule.id,
                notifier = self.notifier.name(),
                error = %e,
                "告警通知发送失败"
            );
        }
    }
}
