//! 信用冻结同步错误类型
//!
//! 区分读取、提交和响应解析阶段的错误，便于日志和指标按类型统计。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("后端返回错误: status={status}, 信息={message}")]
    Backend { status: u16, message: String },

    #[error("响应解析失败: {0}")]
    Decode(String),

    #[error("无效的 cron 表达式: {expression}, 原因={reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error(transparent)]
    Shared(#[from] credit_block_shared::error::SharedError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

impl WorkerError {
    /// 获取错误码，用作指标标签
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "HTTP_ERROR",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::InvalidSchedule { .. } => "INVALID_SCHEDULE",
            Self::Shared(e) => e.code(),
        }
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
