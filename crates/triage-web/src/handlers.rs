//! HTTP处理器

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use triage_admin::TriageMetrics;
use triage_core::{Case, CaseStatus, Severity, TriageError};
use triage_integration::CaseWriter;
use triage_workflow::{
    dispatch_detached, CaseFilter, IntakeRequest, NotificationDispatcher, ScanReport,
    TriageEngine,
};
use uuid::Uuid;

use crate::error::ApiResult;

/// 执行操作的医护人员标识
pub const STAFF_HEADER: &str = "x-staff-id";

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<TriageEngine>>,
    /// 后端写入队列，未配置时只保留内存登记簿
    pub writer: Option<CaseWriter>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub metrics: Arc<TriageMetrics>,
}

impl AppState {
    /// 记录扫描指标，并入队首次超时病例的快照
    ///
    /// 须在持有引擎写锁时调用，写入顺序与登记簿修改顺序一致
    pub fn handle_scan_report(&self, engine: &TriageEngine, report: &ScanReport) {
        self.metrics.record_scan(report);

        let Some(writer) = &self.writer else {
            return;
        };

        for alert in report.alerts.iter().filter(|alert| alert.newly_breached) {
            if let Ok(case) = engine.get_case(alert.case_id) {
                writer.save(case);
            }
        }
    }
}

/// 病例列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct CaseQueryParams {
    pub status: Option<String>,
    pub severity: Option<u8>,
    pub q: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl CaseQueryParams {
    fn into_filter(self) -> Result<CaseFilter, TriageError> {
        let defaults = CaseFilter::default();
        Ok(CaseFilter {
            status: self.status.as_deref().map(str::parse::<CaseStatus>).transpose()?,
            severity: self.severity.map(Severity::new).transpose()?,
            text: self.q.filter(|q| !q.trim().is_empty()),
            limit: self.limit.or(defaults.limit),
            offset: self.offset.or(defaults.offset),
        })
    }
}

/// 状态转换请求
#[derive(Debug, Deserialize, Serialize)]
pub struct TransitionBody {
    pub status: CaseStatus,
    #[serde(default)]
    pub performed_by: Option<String>,
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Emergency Triage API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.engine.read().await.summary();
    Json(state.metrics.health_status(&summary))
}

/// Prometheus 指标
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.get_prometheus_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// 接诊新患者
pub async fn create_case(
    State(state): State<AppState>,
    payload: Result<Json<IntakeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;

    let outcome = {
        let mut engine = state.engine.write().await;
        let outcome = engine.register_case(request)?;
        if let Some(writer) = &state.writer {
            writer.create(&outcome.case);
        }
        outcome
    };
    info!(
        "Registered case {} with severity {}",
        outcome.case.reference, outcome.case.severity
    );

    state.metrics.record_case_created();
    dispatch_detached(state.notifier.clone(), outcome.notifications);

    Ok((StatusCode::CREATED, Json(outcome.case)))
}

/// 病例列表
pub async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<CaseQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let cases = state.engine.read().await.query_cases(&filter);

    Ok(Json(json!({
        "count": cases.len(),
        "offset": filter.offset,
        "limit": filter.limit,
        "cases": cases,
    })))
}

/// 病例详情
pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> ApiResult<Json<Case>> {
    let engine = state.engine.read().await;
    Ok(Json(engine.get_case(case_id)?.clone()))
}

/// 更新病例状态
pub async fn transition_case(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Result<Json<TransitionBody>, JsonRejection>,
) -> ApiResult<Json<Case>> {
    let Json(body) = payload?;
    let performed_by = body.performed_by.or_else(|| {
        headers
            .get(STAFF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });

    let result = {
        let mut engine = state.engine.write().await;
        let result = engine.transition(case_id, body.status, performed_by);
        if let (Ok(case), Some(writer)) = (&result, &state.writer) {
            writer.save(case);
        }
        result
    };

    let case = match result {
        Ok(case) => {
            state.metrics.record_transition(true);
            case
        }
        Err(e) => {
            if matches!(e, TriageError::InvalidTransition { .. }) {
                state.metrics.record_transition(false);
            }
            return Err(e.into());
        }
    };

    Ok(Json(case))
}

/// 当前状态允许的目标状态
pub async fn allowed_transitions(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let engine = state.engine.read().await;
    let case = engine.get_case(case_id)?;
    let allowed = engine.allowed_targets(case_id)?;

    Ok(Json(json!({
        "case_id": case.id,
        "status": case.status,
        "allowed": allowed,
    })))
}

/// 当前超时告警（触发一次扫描）
pub async fn list_alerts(State(state): State<AppState>) -> impl IntoResponse {
    let report = {
        let mut engine = state.engine.write().await;
        let report = engine.scan_delays();
        state.handle_scan_report(&engine, &report);
        report
    };
    dispatch_detached(state.notifier.clone(), report.notifications.clone());

    Json(json!({
        "count": report.alerts.len(),
        "open_cases": report.open_cases,
        "alerts": report.alerts,
    }))
}

/// 看板统计
pub async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.engine.read().await.summary();
    state.metrics.observe_summary(&summary);
    Json(summary)
}
