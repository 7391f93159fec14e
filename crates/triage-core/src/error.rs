//! 错误定义模块

use crate::models::CaseStatus;
use thiserror::Error;

/// 分诊系统统一错误类型
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidTransition { from: CaseStatus, to: CaseStatus },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("后端服务错误: {0}")]
    Backend(String),

    #[error("通知错误: {0}")]
    Notification(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 分诊系统统一结果类型
pub type Result<T> = std::result::Result<T, TriageError>;
