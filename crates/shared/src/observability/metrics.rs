//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未安装 recorder 时，记录函数均为空操作。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(service_name: &str, config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "credit_block_runs_total",
        "Total number of credit block sync runs by outcome"
    );
    metrics::describe_histogram!(
        "credit_block_run_duration_seconds",
        "Duration of the read and dispatch phase of a run in seconds"
    );
    metrics::describe_counter!(
        "credit_block_records_fetched_total",
        "Total number of pending credit block records fetched"
    );
    metrics::describe_counter!(
        "credit_block_changesets_total",
        "Total number of submitted changesets by service and outcome"
    );
    metrics::describe_counter!(
        "credit_block_items_total",
        "Total number of item updates by service and outcome"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次运行结果（read_failed / nothing_to_update / dispatched）
#[inline]
pub fn record_run(outcome: &str, duration_secs: f64) {
    metrics::counter!("credit_block_runs_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("credit_block_run_duration_seconds").record(duration_secs);
}

/// 记录拉取到的待处理记录数
#[inline]
pub fn record_records_fetched(count: usize) {
    metrics::counter!("credit_block_records_fetched_total").increment(count as u64);
}

/// 记录一次 changeset 提交结果
#[inline]
pub fn record_changeset(service: &str, outcome: &str) {
    metrics::counter!(
        "credit_block_changesets_total",
        "service" => service.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录单条行项目的更新结果
#[inline]
pub fn record_item(service: &str, outcome: &str) {
    metrics::counter!(
        "credit_block_items_total",
        "service" => service.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
