//! 统一错误处理模块
//!
//! 定义配置加载和目标系统（destination）解析阶段共享的错误类型。

use thiserror::Error;

/// 共享基础设施错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("目标系统未配置: destination={name}")]
    DestinationNotFound { name: String },

    #[error("目标系统配置无效: destination={name}, 原因={reason}")]
    InvalidDestination { name: String, reason: String },
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::DestinationNotFound { .. } => "DESTINATION_NOT_FOUND",
            Self::InvalidDestination { .. } => "INVALID_DESTINATION",
        }
    }
}
