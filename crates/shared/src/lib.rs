//! 共享库
//!
//! 包含配置、错误处理、目标系统解析和可观测性等基础设施代码。

pub mod config;
pub mod destination;
pub mod error;
pub mod observability;
