//! 系统监控
//!
//! 分诊服务的 Prometheus 指标：病例接诊、状态转换、超时告警和候诊规模

use anyhow::Result;
use prometheus::{IntCounter, IntGauge, Opts, Registry};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use triage_workflow::{RegistrySummary, ScanReport};

/// 分诊指标收集器
#[derive(Debug)]
pub struct TriageMetrics {
    /// Prometheus指标注册表
    registry: Registry,
    /// 接诊病例计数器
    cases_created_total: IntCounter,
    /// 成功的状态转换
    transitions_total: IntCounter,
    /// 被拒绝的状态转换
    rejected_transitions_total: IntCounter,
    /// 首次超时的病例数
    breaches_total: IntCounter,
    /// 未结束的病例数
    open_cases: IntGauge,
    /// 当前超时告警数
    active_alerts: IntGauge,
    /// 服务启动时间
    start_time: Instant,
}

/// 健康等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    Degraded,
}

/// 服务健康状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthLevel,
    pub uptime_seconds: u64,
    pub open_cases: usize,
    pub breached_cases: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TriageMetrics {
    /// 创建新的指标收集器
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cases_created_total = IntCounter::with_opts(Opts::new(
            "triage_cases_created_total",
            "Total number of registered emergency cases",
        ))?;

        let transitions_total = IntCounter::with_opts(Opts::new(
            "triage_transitions_total",
            "Total number of applied status transitions",
        ))?;

        let rejected_transitions_total = IntCounter::with_opts(Opts::new(
            "triage_rejected_transitions_total",
            "Total number of rejected status transitions",
        ))?;

        let breaches_total = IntCounter::with_opts(Opts::new(
            "triage_breaches_total",
            "Total number of cases that exceeded their maximum wait",
        ))?;

        let open_cases = IntGauge::with_opts(Opts::new(
            "triage_open_cases",
            "Number of cases not yet discharged or admitted",
        ))?;

        let active_alerts = IntGauge::with_opts(Opts::new(
            "triage_active_alerts",
            "Number of open cases currently over their wait threshold",
        ))?;

        registry.register(Box::new(cases_created_total.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(rejected_transitions_total.clone()))?;
        registry.register(Box::new(breaches_total.clone()))?;
        registry.register(Box::new(open_cases.clone()))?;
        registry.register(Box::new(active_alerts.clone()))?;

        Ok(Self {
            registry,
            cases_created_total,
            transitions_total,
            rejected_transitions_total,
            breaches_total,
            open_cases,
            active_alerts,
            start_time: Instant::now(),
        })
    }

    /// 记录接诊
    pub fn record_case_created(&self) {
        self.cases_created_total.inc();
    }

    /// 记录状态转换结果
    pub fn record_transition(&self, accepted: bool) {
        if accepted {
            self.transitions_total.inc();
        } else {
            self.rejected_transitions_total.inc();
        }
    }

    /// 记录一次超时扫描
    pub fn record_scan(&self, report: &ScanReport) {
        let newly_breached = report.newly_breached() as u64;
        debug!(
            "Scan observed: {} alerts, {} new breaches, {} open cases",
            report.alerts.len(),
            newly_breached,
            report.open_cases
        );

        self.breaches_total.inc_by(newly_breached);
        self.active_alerts.set(report.alerts.len() as i64);
        self.open_cases.set(report.open_cases as i64);
    }

    /// 按统计摘要刷新候诊规模
    pub fn observe_summary(&self, summary: &RegistrySummary) {
        self.open_cases.set(summary.open_cases as i64);
    }

    /// 获取Prometheus指标
    pub fn get_prometheus_metrics(&self) -> Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }

    /// 获取服务运行时间
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 生成健康状态，存在超时病例时为降级
    pub fn health_status(&self, summary: &RegistrySummary) -> HealthStatus {
        let status = if summary.breached_cases > 0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };

        HealthStatus {
            status,
            uptime_seconds: self.uptime().as_secs(),
            open_cases: summary.open_cases,
            breached_cases: summary.breached_cases,
            timestamp: chrono::Utc::now(),
        }
    }
}
