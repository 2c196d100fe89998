//! 订单行项目更新
//!
//! 标准订单和免费订单的更新流程一致：逐条构建更新请求，
//! 以单个 changeset 原子提交，再按响应结构逐项记录结果。
//! 单个订单失败只记录日志，不影响其他订单。

use std::sync::Arc;

use async_trait::async_trait;
use credit_block_shared::observability::metrics;
use serde_json::json;
use tracing::{error, info};

use crate::error::Result;
use crate::models::{CreditBlockRecord, OrderService, REJECTION_REASON_PROPERTY, UpdateRequest};
use crate::odata::{BatchOperation, ChangesetResponse, ODataClient};

/// changeset 写入端
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangesetWriter: Send + Sync {
    async fn submit(
        &self,
        service: OrderService,
        requests: &[UpdateRequest],
    ) -> Result<Vec<ChangesetResponse>>;
}

#[async_trait]
impl ChangesetWriter for ODataClient {
    async fn submit(
        &self,
        service: OrderService,
        requests: &[UpdateRequest],
    ) -> Result<Vec<ChangesetResponse>> {
        let operations: Vec<BatchOperation> = requests
            .iter()
            .map(|request| BatchOperation {
                method: "PATCH",
                path: service.item_path(&request.order_id, &request.item_id),
                body: json!({ REJECTION_REASON_PROPERTY: request.rejection_reason.code() }),
            })
            .collect();

        self.submit_changeset(service.service_name(self.services()), &operations)
            .await
    }
}

/// 单条行项目的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Updated { status: u16 },
    Failed { status: u16, detail: String },
}

impl ItemOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// 单个订单的处理汇总
#[derive(Debug, Clone)]
pub struct GroupReport {
    pub order_id: String,
    pub service: OrderService,
    pub requested: usize,
    pub outcomes: Vec<ItemOutcome>,
    /// 提交阶段的异常（网络、认证、响应解析等）
    pub submit_error: Option<String>,
}

impl GroupReport {
    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_updated()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.updated_count()
    }
}

/// 为每条记录构建更新请求：设置冻结写入 "70"，解除冻结写入空值
pub fn build_update_requests(records: &[CreditBlockRecord]) -> Vec<UpdateRequest> {
    records.iter().map(UpdateRequest::from).collect()
}

fn generic_error_message(order_id: &str) -> String {
    format!("更新销售订单 {order_id} 时发生错误，详情见下")
}

/// 解读 changeset 响应并逐项记录日志
pub fn interpret_responses(
    order_id: &str,
    service: OrderService,
    responses: &[ChangesetResponse],
) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::new();
    let generic = generic_error_message(order_id);

    for response in responses {
        metrics::record_changeset(service.label(), response.kind());

        match response {
            ChangesetResponse::Success { items } => {
                for item in items {
                    if item.is_success() {
                        info!(
                            sales_order = %order_id,
                            service = service.label(),
                            status = item.status,
                            "销售订单 {} 更新成功",
                            order_id
                        );
                        outcomes.push(ItemOutcome::Updated {
                            status: item.status,
                        });
                    } else {
                        let detail = item.error_message.clone().unwrap_or_default();
                        error!(
                            sales_order = %order_id,
                            service = service.label(),
                            status = item.status,
                            detail = %detail,
                            "{}",
                            generic
                        );
                        outcomes.push(ItemOutcome::Failed {
                            status: item.status,
                            detail,
                        });
                    }
                }
            }
            ChangesetResponse::FailureList { status, details } => {
                for detail in details {
                    error!(
                        sales_order = %order_id,
                        service = service.label(),
                        status = *status,
                        detail = %detail,
                        "{}",
                        generic
                    );
                    outcomes.push(ItemOutcome::Failed {
                        status: *status,
                        detail: detail.clone(),
                    });
                }
            }
            ChangesetResponse::FailureSingle { status, message } => {
                error!(
                    sales_order = %order_id,
                    service = service.label(),
                    status = *status,
                    detail = %message,
                    "{}",
                    generic
                );
                outcomes.push(ItemOutcome::Failed {
                    status: *status,
                    detail: message.clone(),
                });
            }
        }
    }

    for outcome in &outcomes {
        let label = if outcome.is_updated() { "updated" } else { "failed" };
        metrics::record_item(service.label(), label);
    }

    outcomes
}

/// 订单更新器
///
/// 通过 `OrderService` 区分标准订单和免费订单两条路径。
pub struct OrderUpdater {
    writer: Arc<dyn ChangesetWriter>,
}

impl OrderUpdater {
    pub fn new(writer: Arc<dyn ChangesetWriter>) -> Self {
        Self { writer }
    }

    /// 更新同一订单下的全部行项目
    ///
    /// 调用方保证 `records` 非空且属于同一订单。
    pub async fn update(&self, service: OrderService, records: &[CreditBlockRecord]) -> GroupReport {
        let order_id = records
            .first()
            .map(|r| r.sales_document.clone())
            .unwrap_or_default();
        let requests = build_update_requests(records);

        let mut report = GroupReport {
            order_id: order_id.clone(),
            service,
            requested: requests.len(),
            outcomes: Vec::new(),
            submit_error: None,
        };

        match self.writer.submit(service, &requests).await {
            Ok(responses) => {
                report.outcomes = interpret_responses(&order_id, service, &responses);
            }
            Err(e) => {
                error!(
                    sales_order = %order_id,
                    service = service.label(),
                    error = %e,
                    "提交 changeset 失败"
                );
                metrics::record_changeset(service.label(), e.code());
                report.submit_error = Some(e.to_string());
            }
        }

        report
    }

    /// 标准订单路径
    pub async fn update_standard_order(&self, records: &[CreditBlockRecord]) -> GroupReport {
        self.update(OrderService::Standard, records).await
    }

    /// 免费订单路径
    pub async fn update_free_of_charge_order(&self, records: &[CreditBlockRecord]) -> GroupReport {
        self.update(OrderService::FreeOfCharge, records).await
    }
}
