//! 分诊引擎
//!
//! 持有病例登记簿，协调接诊、状态转换、超时检测和通知决策的核心引擎

use crate::{
    delay_watcher::{DelayAlert, DelayWatcher},
    intake::{IntakeRequest, TriageIntake},
    notification::NotificationRequest,
    registry::{CaseFilter, CaseRegistry, RegistrySummary},
    transitioner::StatusTransitioner,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use triage_core::{Case, CaseStatus, Clock, Result, SystemClock, TriageError};
use uuid::Uuid;

/// 接诊结果
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub case: Case,
    pub notifications: Vec<NotificationRequest>,
}

/// 超时扫描结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub alerts: Vec<DelayAlert>,
    pub notifications: Vec<NotificationRequest>,
    pub open_cases: usize,
}

impl ScanReport {
    pub fn newly_breached(&self) -> usize {
        self.alerts.iter().filter(|alert| alert.newly_breached).count()
    }
}

/// 分诊引擎
///
/// 唯一持有病例登记簿的对象，所有修改都经过这里
#[derive(Debug)]
pub struct TriageEngine {
    clock: Arc<dyn Clock>,
    intake: TriageIntake,
    registry: CaseRegistry,
    transitioner: StatusTransitioner,
    watcher: DelayWatcher,
}

impl TriageEngine {
    /// 创建新的分诊引擎
    pub fn new(clock: Arc<dyn Clock>, intake: TriageIntake, watcher: DelayWatcher) -> Self {
        Self {
            clock,
            intake,
            registry: CaseRegistry::new(),
            transitioner: StatusTransitioner::new(),
            watcher,
        }
    }

    /// 接诊新患者
    pub fn register_case(&mut self, request: IntakeRequest) -> Result<IntakeOutcome> {
        let now = self.clock.now();
        let case = self.intake.create_case(request, now)?;
        let case = self.registry.insert(case)?.clone();

        let mut notifications = Vec::new();
        if case.severity.is_immediate() {
            tracing::warn!("Severity 1 arrival for case {}", case.reference);
            notifications.push(NotificationRequest::critical_arrival(&case, now));
        }

        Ok(IntakeOutcome {
            case,
            notifications,
        })
    }

    /// 更新病例状态
    pub fn transition(
        &mut self,
        case_id: Uuid,
        target: CaseStatus,
        performed_by: Option<String>,
    ) -> Result<Case> {
        let now = self.clock.now();
        self.transitioner
            .transition(&mut self.registry, case_id, target, performed_by, now)
    }

    /// 执行一次超时扫描，首次超时的病例各产生一条通知请求
    pub fn scan_delays(&mut self) -> ScanReport {
        let now = self.clock.now();
        let alerts = self.watcher.scan(&mut self.registry, now);

        let notifications = alerts
            .iter()
            .filter(|alert| alert.newly_breached)
            .map(|alert| NotificationRequest::wait_breach(alert, now))
            .collect();

        ScanReport {
            alerts,
            notifications,
            open_cases: self.registry.summary().open_cases,
        }
    }

    /// 恢复已持久化的病例，批次中任一病例冲突时整批不写入
    pub fn restore_cases(&mut self, cases: Vec<Case>) -> Result<usize> {
        let mut seen = HashSet::with_capacity(cases.len());
        for case in &cases {
            if !seen.insert(case.id) {
                return Err(TriageError::Validation(format!(
                    "case {} appears more than once in the restored set",
                    case.id
                )));
            }
            if self.registry.get(case.id).is_some() {
                return Err(TriageError::Validation(format!(
                    "case {} is already registered",
                    case.id
                )));
            }
        }

        let mut restored = 0;
        for case in cases {
            self.registry.restore(case)?;
            restored += 1;
        }
        tracing::info!("Restored {} cases into the registry", restored);
        Ok(restored)
    }

    pub fn get_case(&self, case_id: Uuid) -> Result<&Case> {
        self.registry.require(case_id)
    }

    pub fn query_cases(&self, filter: &CaseFilter) -> Vec<Case> {
        self.registry.query(filter)
    }

    pub fn allowed_targets(&self, case_id: Uuid) -> Result<Vec<CaseStatus>> {
        self.transitioner.allowed_targets(&self.registry, case_id)
    }

    pub fn summary(&self) -> RegistrySummary {
        self.registry.summary()
    }

    /// 获取登记簿实例
    pub fn registry(&self) -> &CaseRegistry {
        &self.registry
    }

    pub fn intake(&self) -> &TriageIntake {
        &self.intake
    }

    pub fn watcher(&self) -> &DelayWatcher {
        &self.watcher
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock),
            TriageIntake::default(),
            DelayWatcher::default(),
        )
    }
}
