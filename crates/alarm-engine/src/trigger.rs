//! 触发状态机
//!
//! 纯决策函数：输入上一周期状态、本周期匹配结果与当前时间，
//! 输出新状态和需要执行的副作用。不做任何 I/O，副作用由编排器执行。
//!
//! ```text
//!            matched               elapsed >= interval, claim won
//!  Idle ───────────────► Accumulating ───────────────────────────► Armed
//!   ▲                        │                                       │
//!   │     not matched        │                     not matched       │
//!   ├────────────────────────┘                     (Release)         │
//!   └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `armed` 来自规则的持久化标记；`match_started_at` 只保存在进程内。

use chrono::{DateTime, Duration, Utc};

/// 单条规则的触发状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerState {
    /// 当前连续匹配段的起始时间，仅在规则匹配时存在
    pub match_started_at: Option<DateTime<Utc>>,
    /// 是否已在当前匹配段内触发
    pub armed: bool,
}

impl TriggerState {
    pub fn new(match_started_at: Option<DateTime<Utc>>, armed: bool) -> Self {
        Self {
            match_started_at,
            armed,
        }
    }
}

/// 需要编排器执行的副作用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEffect {
    /// 无条件复位持久化的 armed 标记
    Release,
    /// 条件抢占 armed 标记，成功后写入触发记录并发送通知
    ClaimAndFire,
}

/// 本周期的决策阶段（用于日志与统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    /// 不匹配且未触发
    Idle,
    /// 不匹配，结束已触发的匹配段
    Rearming,
    /// 匹配中，尚未达到持续时长
    Accumulating { remaining: Duration },
    /// 达到持续时长，尝试触发
    Firing,
    /// 已触发，保持静默
    Holding,
}

/// 决策结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDecision {
    /// 副作用全部成功后的状态
    pub next: TriggerState,
    pub effects: Vec<TriggerEffect>,
    pub phase: TriggerPhase,
}

/// 根据上一状态、匹配结果和当前时间做出决策
///
/// `sustain` 为持续匹配门槛，小于等于零时立即满足。
pub fn decide(
    previous: TriggerState,
    matched: bool,
    now: DateTime<Utc>,
    sustain: Duration,
) -> TriggerDecision {
    if !matched {
        let (effects, phase) = if previous.armed {
            (vec![TriggerEffect::Release], TriggerPhase::Rearming)
        } else {
            (Vec::new(), TriggerPhase::Idle)
        };
        return TriggerDecision {
            next: TriggerState::new(None, false),
            effects,
            phase,
        };
    }

    let started_at = previous.match_started_at.unwrap_or(now);
    let elapsed = now - started_at;
    let sustained = sustain <= Duration::zero() || elapsed >= sustain;

    if !sustained {
        return TriggerDecision {
            next: TriggerState::new(Some(started_at), previous.armed),
            effects: Vec::new(),
            phase: TriggerPhase::Accumulating {
                remaining: sustain - elapsed,
            },
        };
    }

    if previous.armed {
        return TriggerDecision {
            next: TriggerState::new(Some(started_at), true),
            effects: Vec::new(),
            phase: TriggerPhase::Holding,
        };
    }

    TriggerDecision {
        next: TriggerState::new(Some(started_at), true),
        effects: vec![TriggerEffect::ClaimAndFire],
        phase: TriggerPhase::Firing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minute)
    }

    /// 模拟多个周期，返回每个周期是否产生触发
    fn simulate(samples: &[(i64, bool)], sustain: Duration) -> Vec<bool> {
        let mut state = TriggerState::default();
        samples
            .iter()
            .map(|&(minute, matched)| {
                let decision = decide(state, matched, at(minute), sustain);
                state = decision.next;
                decision.effects.contains(&TriggerEffect::ClaimAndFire)
            })
            .collect()
    }

    #[test]
    fn test_idle_when_not_matching() {
        let decision = decide(TriggerState::default(), false, at(0), Duration::zero());
        assert_eq!(decision.phase, TriggerPhase::Idle);
        assert!(decision.effects.is_empty());
        assert_eq!(decision.next, TriggerState::default());
    }

    #[test]
    fn test_zero_interval_fires_immediately() {
        let decision = decide(TriggerState::default(), true, at(0), Duration::zero());
        assert_eq!(decision.phase, TriggerPhase::Firing);
        assert_eq!(decision.effects, vec![TriggerEffect::ClaimAndFire]);
        assert_eq!(decision.next, TriggerState::new(Some(at(0)), true));
    }

    #[test]
    fn test_negative_interval_fires_immediately() {
        let decision = decide(TriggerState::default(), true, at(0), Duration::minutes(-3));
        assert_eq!(decision.phase, TriggerPhase::Firing);
    }

    #[test]
    fn test_records_streak_start() {
        let decision = decide(TriggerState::default(), true, at(0), Duration::minutes(5));
        assert_eq!(
            decision.phase,
            TriggerPhase::Accumulating {
                remaining: Duration::minutes(5)
            }
        );
        assert_eq!(decision.next.match_started_at, Some(at(0)));
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_fires_at_first_sample_reaching_interval() {
        let fired = simulate(
            &[(0, true), (2, true), (4, true), (5, true), (7, true)],
            Duration::minutes(5),
        );
        assert_eq!(fired, vec![false, false, false, true, false]);
    }

    #[test]
    fn test_fires_late_when_samples_skip_threshold() {
        let fired = simulate(&[(0, true), (3, true), (9, true)], Duration::minutes(5));
        assert_eq!(fired, vec![false, false, true]);
    }

    #[test]
    fn test_broken_streak_restarts_timer() {
        let fired = simulate(
            &[(0, true), (4, true), (5, false), (6, true), (10, true), (11, true)],
            Duration::minutes(5),
        );
        assert_eq!(fired, vec![false, false, false, false, false, true]);
    }

    #[test]
    fn test_holds_while_armed() {
        let armed = TriggerState::new(Some(at(0)), true);
        let decision = decide(armed, true, at(30), Duration::minutes(5));
        assert_eq!(decision.phase, TriggerPhase::Holding);
        assert!(decision.effects.is_empty());
        assert_eq!(decision.next, armed);
    }

    #[test]
    fn test_release_on_de_match() {
        let armed = TriggerState::new(Some(at(0)), true);
        let decision = decide(armed, false, at(1), Duration::minutes(5));
        assert_eq!(decision.phase, TriggerPhase::Rearming);
        assert_eq!(decision.effects, vec![TriggerEffect::Release]);
        assert_eq!(decision.next, TriggerState::default());
    }

    #[test]
    fn test_rearm_requires_new_sustained_streak() {
        let fired = simulate(
            &[(0, true), (1, true), (2, false), (3, true), (4, true)],
            Duration::zero(),
        );
        // 同一匹配段只触发一次，复位后重新触发
        assert_eq!(fired, vec![true, false, false, true, false]);
    }

    #[test]
    fn test_armed_after_restart_without_streak() {
        // 进程重启后内存状态丢失，但持久化 armed 仍然有效
        let restored = TriggerState::new(None, true);
        let decision = decide(restored, true, at(0), Duration::zero());
        assert_eq!(decision.phase, TriggerPhase::Holding);
        assert!(decision.effects.is_empty());
    }

    #[test]
    fn test_armed_still_accumulating_after_restart() {
        let restored = TriggerState::new(None, true);
        let decision = decide(restored, true, at(0), Duration::minutes(10));
        assert!(decision.effects.is_empty());
        assert!(decision.next.armed);
        assert_eq!(decision.next.match_started_at, Some(at(0)));
    }

    #[test]
    fn test_clock_going_backwards_does_not_fire() {
        let state = TriggerState::new(Some(at(10)), false);
        let decision = decide(state, true, at(8), Duration::minutes(1));
        assert!(decision.effects.is_empty());
    }
}
