//! 订单类型分发
//!
//! 按每组首条记录的单据类别选择更新路径，每个订单一个独立任务，
//! 分发后不等待完成。返回的 [`Dispatched`] 可选地作为汇合点使用，
//! 直接 drop 即放任任务在后台运行。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::grouper::OrderGroups;
use crate::models::{CreditBlockRecord, OrderService};
use crate::updater::{GroupReport, OrderUpdater};

/// 根据首条记录决定目标服务，空组返回 `None`
///
/// 同一订单内的单据类别视为一致，不逐条校验。
pub fn route(group: &[CreditBlockRecord]) -> Option<OrderService> {
    group.first().map(|record| OrderService::from(record.category()))
}

/// 已分发的订单任务
pub struct Dispatched {
    handles: Vec<(String, JoinHandle<GroupReport>)>,
}

impl Dispatched {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 等待全部订单任务结束并收集结果
    ///
    /// 单个任务 panic 只记录日志，不影响其他任务的结果。
    pub async fn join(self) -> Vec<GroupReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for (order_id, handle) in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(sales_order = %order_id, error = %e, "订单更新任务异常退出");
                }
            }
        }
        reports
    }
}

/// 订单分发器
#[derive(Clone)]
pub struct Dispatcher {
    updater: Arc<OrderUpdater>,
}

impl Dispatcher {
    pub fn new(updater: Arc<OrderUpdater>) -> Self {
        Self { updater }
    }

    /// 为每个订单启动一个更新任务
    ///
    /// 必须在 tokio 运行时内调用。任务数量不设上限。
    pub fn dispatch(&self, groups: OrderGroups) -> Dispatched {
        let mut handles = Vec::with_capacity(groups.len());

        for (order_id, records) in groups {
            let Some(service) = route(&records) else {
                debug!(sales_order = %order_id, "订单无行项目，跳过");
                continue;
            };

            debug!(
                sales_order = %order_id,
                service = service.label(),
                items = records.len(),
                "分发订单更新"
            );

            let updater = Arc::clone(&self.updater);
            let handle = tokio::spawn(async move {
                match service {
                    OrderService::Standard => updater.update_standard_order(&records).await,
                    OrderService::FreeOfCharge => {
                        updater.update_free_of_charge_order(&records).await
                    }
                }
            });
            handles.push((order_id, handle));
        }

        Dispatched { handles }
    }
}
