//! 信用冻结记录读取
//!
//! 从自定义 CDS 服务拉取全部待处理的行项目，不做重试。

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::models::CreditBlockRecord;
use crate::odata::ODataClient;

/// 待处理记录来源
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditBlockSource: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<CreditBlockRecord>>;
}

#[async_trait]
impl CreditBlockSource for ODataClient {
    async fn fetch_pending(&self) -> Result<Vec<CreditBlockRecord>> {
        let services = self.services();
        let records: Vec<CreditBlockRecord> = self
            .get_all(&services.credit_block_service, &services.credit_block_entity_set)
            .await?;

        debug!(
            destination = %self.destination().name,
            count = records.len(),
            "已拉取待处理信用冻结记录"
        );

        Ok(records)
    }
}
