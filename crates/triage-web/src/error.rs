//! HTTP错误映射

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use triage_core::TriageError;

/// API错误，包装核心错误并映射为HTTP响应
#[derive(Debug)]
pub struct ApiError(pub TriageError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TriageError::Validation(_) => StatusCode::BAD_REQUEST,
            TriageError::NotFound(_) => StatusCode::NOT_FOUND,
            TriageError::InvalidTransition { .. } => StatusCode::CONFLICT,
            TriageError::Backend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match &self.0 {
            TriageError::Config(_) => "config_error",
            TriageError::Validation(_) => "validation_error",
            TriageError::InvalidTransition { .. } => "invalid_transition",
            TriageError::NotFound(_) => "not_found",
            TriageError::Backend(_) => "backend_error",
            TriageError::Notification(_) => "notification_error",
            TriageError::Io(_) => "io_error",
            TriageError::Serialization(_) => "serialization_error",
            TriageError::Internal(_) => "internal_error",
        }
    }
}

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        Self(err)
    }
}

/// 请求体无法解析时按验证错误返回
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(TriageError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.0.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
