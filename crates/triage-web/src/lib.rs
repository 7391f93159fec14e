//! # 分诊 Web API
//!
//! 基于 axum 的 JSON 接口：接诊、病例查询、状态转换、超时告警和看板统计

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use handlers::{AppState, STAFF_HEADER};
pub use server::{create_app, WebServer};
