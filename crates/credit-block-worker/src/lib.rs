//! 信用冻结同步任务
//!
//! 定时从 S/4HANA 读取待处理的信用冻结行项目，按销售订单分组，
//! 分别通过标准订单或免费订单服务以 changeset 批量写回拒绝原因：
//! - 读取：自定义 CDS 服务，跟随 `__next` 分页
//! - 分组：保持订单首次出现顺序
//! - 分发：每个订单一个独立任务，不等待完成
//! - 写回：OData `$batch`，逐项记录响应结果

pub mod dispatcher;
pub mod error;
pub mod grouper;
pub mod job;
pub mod models;
pub mod odata;
pub mod reader;
pub mod scheduler;
pub mod updater;

pub use error::{Result, WorkerError};
pub use job::{CreditBlockJob, RunOutcome};
pub use scheduler::CreditBlockScheduler;
