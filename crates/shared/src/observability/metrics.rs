//! Prometheus 指标
//!
//! 记录器全局安装一次，`/metrics` 由单独的 axum 服务在 `metrics_port` 上提供。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::ObservabilityConfig;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// 导出服务的句柄，drop 时不会停止服务
pub struct MetricsHandle {
    /// 实际监听地址（端口为 0 时由系统分配）
    pub local_addr: SocketAddr,
    _server: JoinHandle<()>,
}

/// 安装记录器并启动导出服务
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = RECORDER.set(handle.clone());
    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let (local_addr, server) = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        local_addr,
        _server: server,
    })
}

/// 以 Prometheus 文本格式渲染当前指标，记录器未安装时返回 None
pub fn render() -> Option<String> {
    RECORDER.get().map(PrometheusHandle::render)
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("alarm_cycles_total", "Total number of evaluation cycles");
    metrics::describe_histogram!(
        "alarm_cycle_duration_seconds",
        "Evaluation cycle duration in seconds"
    );

    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_counter!("alarm_firings_total", "Total number of alarm firings");
    metrics::describe_counter!("alarm_releases_total", "Total number of alarm re-arms");
    metrics::describe_counter!(
        "alarm_claims_lost_total",
        "Claim attempts lost to a concurrent evaluator"
    );
    metrics::describe_counter!(
        "alarm_side_effect_failures_total",
        "Failed claim, release, firing record or notification operations"
    );
    metrics::describe_gauge!(
        "worker_last_run_timestamp_seconds",
        "Unix timestamp of the last worker iteration"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 绑定端口并在后台提供 `/metrics` 与 `/health`
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics exporter stopped");
        }
    });
    info!(%local_addr, "Metrics exporter listening");

    Ok((local_addr, server))
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次评估周期
#[inline]
pub fn record_cycle(status: &str, duration_secs: f64) {
    metrics::counter!("alarm_cycles_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("alarm_cycle_duration_seconds").record(duration_secs);
}

/// 记录规则评估
#[inline]
pub fn record_rule_evaluation(matched: bool) {
    metrics::counter!(
        "rule_evaluations_total",
        "matched" => matched.to_string()
    )
    .increment(1);
}

/// 记录告警触发
#[inline]
pub fn record_alarm_fired(rule_id: i64) {
    metrics::counter!("alarm_firings_total", "rule_id" => rule_id.to_string()).increment(1);
}

/// 记录告警复位
#[inline]
pub fn record_alarm_released(rule_id: i64) {
    metrics::counter!("alarm_releases_total", "rule_id" => rule_id.to_string()).increment(1);
}

/// 记录抢占失败（其他评估实例已触发）
#[inline]
pub fn record_claim_lost(rule_id: i64) {
    metrics::counter!("alarm_claims_lost_total", "rule_id" => rule_id.to_string()).increment(1);
}

/// 记录副作用失败
#[inline]
pub fn record_side_effect_failure(operation: &str) {
    metrics::counter!(
        "alarm_side_effect_failures_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// 记录 Worker 最近一次运行时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    metrics::gauge!("worker_last_run_timestamp_seconds", "worker" => worker.to_string()).set(now);
}
