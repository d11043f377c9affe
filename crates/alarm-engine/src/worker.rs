//! 定时评估 Worker
//!
//! 以固定间隔调用引擎执行评估周期。同一 Worker 内的周期串行执行，
//! 周期失败只记录日志，等待下一个周期重试。

use std::sync::Arc;
use std::time::{Duration, Instant};

use alarm_shared::observability::metrics;
use tokio::sync::watch;
use tracing::{error, info};

use crate::engine::{AlarmEngine, CycleReport};
use crate::error::Result;

const WORKER_NAME: &str = "alarm_evaluation_worker";

/// 评估 Worker
pub struct EvaluationWorker {
    engine: Arc<AlarmEngine>,
    interval: Duration,
}

impl EvaluationWorker {
    pub fn new(engine: Arc<AlarmEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// 执行一次评估周期并记录指标
    pub async fn tick(&self) -> Result<CycleReport> {
        let start = Instant::now();
        info!("评估周期开始");

        let result = self.engine.run_cycle().await;
        let elapsed = start.elapsed();

        match &result {
            Ok(report) => {
                metrics::record_cycle("success", elapsed.as_secs_f64());
                info!(
                    rules = report.rules_evaluated,
                    matched = report.matched,
                    fired = report.fired,
                    released = report.released,
                    claims_lost = report.claims_lost,
                    failures = report.failures,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "评估周期结束"
                );
            }
            Err(e) => {
                metrics::record_cycle("error", elapsed.as_secs_f64());
                error!(
                    error = %e,
                    code = e.code(),
                    retryable = e.is_retryable(),
                    "评估周期失败"
                );
            }
        }

        metrics::set_worker_last_run(WORKER_NAME);
        result
    }

    /// 主循环：持续执行直到收到关闭信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.interval, "EvaluationWorker 已启动");

        loop {
            if *shutdown.borrow() {
                break;
            }

            // 错误已在 tick 中记录
            let _ = self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("EvaluationWorker 已停止");
    }
}
