//! 领域模型
//!
//! 待处理的信用冻结记录、订单类别、拒绝原因以及两套订单服务的元数据。

use serde::{Deserialize, Serialize};

use credit_block_shared::config::ServicesConfig;

/// 标准销售订单的单据类别
pub const STANDARD_ORDER_CATEGORY: &str = "C";

/// 设置信用冻结时写入的拒绝原因代码
pub const CREDIT_BLOCK_REJECTION_CODE: &str = "70";

/// 承载信用冻结的行项目字段
pub const REJECTION_REASON_PROPERTY: &str = "SalesDocumentRjcnReason";

/// 一条待复核的销售订单行项目
///
/// 每次运行重新拉取，不做本地持久化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBlockRecord {
    #[serde(rename = "SalesDocument")]
    pub sales_document: String,
    #[serde(rename = "SalesDocumentItem")]
    pub sales_document_item: String,
    #[serde(rename = "SDDocumentCategory")]
    pub sd_document_category: String,
    #[serde(rename = "SetCreditBlock")]
    pub set_credit_block: bool,
}

impl CreditBlockRecord {
    pub fn category(&self) -> OrderCategory {
        OrderCategory::from_discriminator(&self.sd_document_category)
    }
}

/// 订单类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCategory {
    Standard,
    FreeOfCharge,
}

impl OrderCategory {
    /// `"C"` 为标准订单，其余一律按免费订单处理
    pub fn from_discriminator(value: &str) -> Self {
        if value == STANDARD_ORDER_CATEGORY {
            Self::Standard
        } else {
            Self::FreeOfCharge
        }
    }
}

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// 设置信用冻结
    Block,
    /// 解除信用冻结
    Clear,
}

impl RejectionReason {
    pub fn from_flag(set_credit_block: bool) -> Self {
        if set_credit_block {
            Self::Block
        } else {
            Self::Clear
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Block => CREDIT_BLOCK_REJECTION_CODE,
            Self::Clear => "",
        }
    }
}

/// 单条行项目的更新请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub order_id: String,
    pub item_id: String,
    pub rejection_reason: RejectionReason,
}

impl From<&CreditBlockRecord> for UpdateRequest {
    fn from(record: &CreditBlockRecord) -> Self {
        Self {
            order_id: record.sales_document.clone(),
            item_id: record.sales_document_item.clone(),
            rejection_reason: RejectionReason::from_flag(record.set_credit_block),
        }
    }
}

/// 目标订单服务
///
/// 两套服务结构一致，仅服务名、实体集和键字段名不同。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderService {
    Standard,
    FreeOfCharge,
}

impl OrderService {
    /// 指标和日志中使用的标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::FreeOfCharge => "free_of_charge",
        }
    }

    pub fn service_name<'a>(&self, services: &'a ServicesConfig) -> &'a str {
        match self {
            Self::Standard => &services.standard_order_service,
            Self::FreeOfCharge => &services.free_of_charge_order_service,
        }
    }

    pub fn entity_set(&self) -> &'static str {
        match self {
            Self::Standard => "A_SalesOrderItem",
            Self::FreeOfCharge => "A_SalesOrderWithoutChargeItem",
        }
    }

    /// (订单键字段, 行项目键字段)
    pub fn key_properties(&self) -> (&'static str, &'static str) {
        match self {
            Self::Standard => ("SalesOrder", "SalesOrderItem"),
            Self::FreeOfCharge => ("SalesOrderWithoutCharge", "SalesOrderWithoutChargeItem"),
        }
    }

    /// 行项目实体的相对路径，如 `A_SalesOrderItem(SalesOrder='1',SalesOrderItem='10')`
    pub fn item_path(&self, order_id: &str, item_id: &str) -> String {
        let (order_key, item_key) = self.key_properties();
        format!(
            "{}({}='{}',{}='{}')",
            self.entity_set(),
            order_key,
            escape_key(order_id),
            item_key,
            escape_key(item_id)
        )
    }
}

impl From<OrderCategory> for OrderService {
    fn from(category: OrderCategory) -> Self {
        match category {
            OrderCategory::Standard => Self::Standard,
            OrderCategory::FreeOfCharge => Self::FreeOfCharge,
        }
    }
}

/// OData 字符串字面量中的单引号需要成对转义
fn escape_key(value: &str) -> String {
    value.replace('\'', "''")
}
