//! 单次同步运行
//!
//! 读取 -> 分组 -> 分发。读取失败与无数据都不会发起写入，
//! 但两者以不同的结果、日志级别和指标标签区分。

use std::sync::Arc;
use std::time::Instant;

use credit_block_shared::observability::metrics;
use tracing::{error, info};

use crate::dispatcher::{Dispatched, Dispatcher};
use crate::grouper::group_by_order;
use crate::reader::CreditBlockSource;
use crate::updater::GroupReport;

/// 单次运行的结果
pub enum RunOutcome {
    /// 读取失败，本轮未发起任何写入
    ReadFailed,
    /// 没有待处理记录
    NothingToUpdate,
    /// 已为各订单启动更新任务
    Dispatched(Dispatched),
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReadFailed => "read_failed",
            Self::NothingToUpdate => "nothing_to_update",
            Self::Dispatched(_) => "dispatched",
        }
    }
}

/// 信用冻结同步任务
pub struct CreditBlockJob {
    source: Arc<dyn CreditBlockSource>,
    dispatcher: Dispatcher,
}

impl CreditBlockJob {
    pub fn new(source: Arc<dyn CreditBlockSource>, dispatcher: Dispatcher) -> Self {
        Self { source, dispatcher }
    }

    /// 执行一次读取与分发，不等待订单更新任务完成
    pub async fn run_once(&self) -> RunOutcome {
        let start = Instant::now();

        let outcome = match self.source.fetch_pending().await {
            Err(e) => {
                error!(error = %e, code = e.code(), "读取待处理信用冻结记录失败，本轮跳过");
                RunOutcome::ReadFailed
            }
            Ok(records) if records.is_empty() => {
                info!(":: Nothing to update ::");
                RunOutcome::NothingToUpdate
            }
            Ok(records) => {
                metrics::record_records_fetched(records.len());
                let groups = group_by_order(Some(records));
                info!(orders = groups.len(), "开始分发订单更新");
                RunOutcome::Dispatched(self.dispatcher.dispatch(groups))
            }
        };

        metrics::record_run(outcome.label(), start.elapsed().as_secs_f64());
        outcome
    }

    /// 执行一次并等待全部订单任务结束，返回各订单的处理汇总
    pub async fn run_to_completion(&self) -> Vec<GroupReport> {
        match self.run_once().await {
            RunOutcome::Dispatched(dispatched) => {
                let reports = dispatched.join().await;
                let updated: usize = reports.iter().map(GroupReport::updated_count).sum();
                let failed: usize = reports.iter().map(GroupReport::failed_count).sum();
                let submit_errors = reports.iter().filter(|r| r.submit_error.is_some()).count();
                info!(
                    orders = reports.len(),
                    updated,
                    failed,
                    submit_errors,
                    "本轮同步完成"
                );
                reports
            }
            _ => Vec::new(),
        }
    }
}
