//! 信用冻结同步服务
//!
//! 启动后立即同步一次，之后按 `JOB_FREQUENCY_MIN` 周期运行。

use std::sync::Arc;

use anyhow::Result;
use credit_block_shared::config::AppConfig;
use credit_block_shared::destination::Destination;
use credit_block_shared::observability;
use credit_block_worker::dispatcher::Dispatcher;
use credit_block_worker::odata::ODataClient;
use credit_block_worker::updater::OrderUpdater;
use credit_block_worker::{CreditBlockJob, CreditBlockScheduler};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

const SERVICE_NAME: &str = "credit-block-worker";

#[tokio::main]
async fn main() -> Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!(
        environment = %config.environment,
        production = config.is_production(),
        job = %config.job.name,
        frequency_minutes = config.job.frequency_minutes,
        "Starting credit-block-worker..."
    );

    let destination = Destination::resolve(&config.destination)?;
    info!(destination = %destination.name, url = %destination.url, "目标系统已解析");

    let client = Arc::new(ODataClient::new(destination, config.services.clone())?);
    let updater = Arc::new(OrderUpdater::new(client.clone()));
    let job = Arc::new(CreditBlockJob::new(client, Dispatcher::new(updater)));
    let scheduler = CreditBlockScheduler::new(&config.job, job)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "调度任务异常退出");
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
