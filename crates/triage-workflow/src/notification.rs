//! 通知请求
//!
//! 分诊核心只决定何时需要通知，投递由外部的通知分发器完成

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use triage_core::{Case, Result, Severity};
use uuid::Uuid;

use crate::delay_watcher::DelayAlert;

/// 通知类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WaitBreach,      // 候诊超时
    CriticalArrival, // 1 级危重患者到达
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::WaitBreach => "triage.wait_breach",
            NotificationKind::CriticalArrival => "triage.critical_arrival",
        }
    }
}

/// 通知请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRequest {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub case_id: Uuid,
    pub reference: String,
    pub severity: Severity,
    pub message: String,
    pub requested_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn critical_arrival(case: &Case, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: NotificationKind::CriticalArrival,
            case_id: case.id,
            reference: case.reference.clone(),
            severity: case.severity,
            message: format!(
                "{} arrived with severity {} ({}): {}",
                case.patient.name,
                case.severity,
                case.severity.label(),
                case.motif
            ),
            requested_at: now,
        }
    }

    pub fn wait_breach(alert: &DelayAlert, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: NotificationKind::WaitBreach,
            case_id: alert.case_id,
            reference: alert.reference.clone(),
            severity: alert.severity,
            message: alert.message.clone(),
            requested_at: now,
        }
    }
}

/// 通知分发器
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// 发送通知请求
    async fn dispatch(&self, request: &NotificationRequest) -> Result<()>;
}

/// 后台发送通知，失败只记录日志不重试
pub fn dispatch_detached(
    dispatcher: Arc<dyn NotificationDispatcher>,
    requests: Vec<NotificationRequest>,
) {
    if requests.is_empty() {
        return;
    }

    tokio::spawn(async move {
        for request in requests {
            if let Err(e) = dispatcher.dispatch(&request).await {
                tracing::error!(
                    "Failed to dispatch {} notification for case {}: {}",
                    request.kind.as_str(),
                    request.reference,
                    e
                );
            }
        }
    });
}
