//! 通知分发
//!
//! 分诊核心产生的通知请求在这里交给外部通道，支持：
//! - 日志通知，仅记录请求
//! - Webhook 通知，带可选签名的 JSON 推送

use async_trait::async_trait;
use tracing::{error, info, warn};
use triage_core::{Result, TriageError};
use triage_workflow::{NotificationDispatcher, NotificationKind, NotificationRequest};

/// 日志通知器
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn dispatch(&self, request: &NotificationRequest) -> Result<()> {
        match request.kind {
            NotificationKind::CriticalArrival => {
                warn!("[{}] {}: {}", request.kind.as_str(), request.reference, request.message)
            }
            NotificationKind::WaitBreach => {
                info!("[{}] {}: {}", request.kind.as_str(), request.reference, request.message)
            }
        }
        Ok(())
    }
}

/// Webhook 通知器
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, secret: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            secret,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 生成签名
    pub fn generate_signature(&self, payload: &str) -> Option<String> {
        use sha2::{Digest, Sha256};

        self.secret.as_ref().map(|secret| {
            let mut hasher = Sha256::new();
            hasher.update(payload);
            hasher.update(secret);
            format!("sha256={:x}", hasher.finalize())
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn dispatch(&self, request: &NotificationRequest) -> Result<()> {
        let payload = serde_json::to_string(request)?;

        let mut http_request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "Triage-Notifier/1.0")
            .header("X-Triage-Event", request.kind.as_str());

        if let Some(signature) = self.generate_signature(&payload) {
            http_request = http_request.header("X-Triage-Signature", signature);
        }

        match http_request.body(payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(
                    "Sent {} notification for {} to {}",
                    request.kind.as_str(),
                    request.reference,
                    self.url
                );
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                error!("Notification webhook failed with status {}: {}", status, self.url);
                Err(TriageError::Notification(format!(
                    "webhook responded with status {}",
                    status
                )))
            }
            Err(e) => {
                error!("Failed to send notification to {}: {}", self.url, e);
                Err(TriageError::Notification(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use triage_core::Severity;
    use uuid::Uuid;

    fn request() -> NotificationRequest {
        NotificationRequest {
            id: Uuid::new_v4(),
            kind: NotificationKind::WaitBreach,
            case_id: Uuid::new_v4(),
            reference: "URG-20261019-0A1B2C".to_string(),
            severity: Severity::new(2).unwrap(),
            message: "waiting 11 min".to_string(),
            requested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_every_kind() {
        let notifier = LogNotifier;
        let mut req = request();
        assert!(notifier.dispatch(&req).await.is_ok());
        req.kind = NotificationKind::CriticalArrival;
        assert!(notifier.dispatch(&req).await.is_ok());
    }

    #[test]
    fn test_webhook_signature() {
        let notifier = WebhookNotifier::new(
            "https://example.com/hooks/triage",
            Some("test-secret".to_string()),
        );
        let payload = r#"{"test": "data"}"#;
        let signature = notifier.generate_signature(payload).unwrap();
        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), "sha256=".len() + 64);
        assert_eq!(notifier.generate_signature(payload), Some(signature));

        let unsigned = WebhookNotifier::new("https://example.com/hooks/triage", None);
        assert!(unsigned.generate_signature(payload).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_reports_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/unreachable", None);
        let result = notifier.dispatch(&request()).await;
        assert!(matches!(result, Err(TriageError::Notification(_))));
    }
}
