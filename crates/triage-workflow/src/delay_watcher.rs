//! 候诊超时检测
//!
//! 定期比较候诊时长与各严重程度的最长等待时间，产生超时告警

use crate::registry::CaseRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use triage_core::utils::minutes_over;
use triage_core::{Case, CaseStatus, Severity, BREACH_TAG};
use uuid::Uuid;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// 超时告警
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayAlert {
    pub case_id: Uuid,
    pub reference: String,
    pub patient_name: String,
    pub severity: Severity,
    pub max_wait_minutes: u32,
    pub waited_minutes: i64,
    pub minutes_over: i64,
    pub message: String,
    /// 本次扫描首次打上超时标签
    pub newly_breached: bool,
}

/// 候诊超时检测器
#[derive(Debug, Clone)]
pub struct DelayWatcher {
    poll_interval: Duration,
}

impl DelayWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// 仍在候诊、有正的等待上限且已超时
    pub fn is_breached(case: &Case, now: DateTime<Utc>) -> bool {
        match (case.status, case.max_wait_minutes) {
            (CaseStatus::AwaitingConsultation, Some(max_wait)) if max_wait > 0 => {
                now.signed_duration_since(case.arrival_time)
                    > chrono::Duration::minutes(i64::from(max_wait))
            }
            _ => false,
        }
    }

    /// 扫描登记簿，返回当前全部超时告警，每个病例至多一条
    pub fn scan(&self, registry: &mut CaseRegistry, now: DateTime<Utc>) -> Vec<DelayAlert> {
        let mut alerts = Vec::new();

        for case in registry.iter_mut() {
            if !Self::is_breached(case, now) {
                continue;
            }
            let Some(max_wait) = case.max_wait_minutes else {
                continue;
            };

            let newly_breached = case.alerts.insert(BREACH_TAG.to_string());
            let elapsed = now.signed_duration_since(case.arrival_time);
            let over = minutes_over(elapsed, max_wait);
            let waited = case.waited_minutes(now);

            let message = format!(
                "{} (severity {}) waiting {} min, {} min over the {} min threshold",
                case.patient.name, case.severity, waited, over, max_wait
            );

            if newly_breached {
                tracing::warn!("Case {} breached wait threshold: {}", case.reference, message);
            }

            alerts.push(DelayAlert {
                case_id: case.id,
                reference: case.reference.clone(),
                patient_name: case.patient.name.clone(),
                severity: case.severity,
                max_wait_minutes: max_wait,
                waited_minutes: waited,
                minutes_over: over,
                message,
                newly_breached,
            });
        }

        tracing::debug!("Delay scan found {} breached cases", alerts.len());
        alerts
    }
}

impl Default for DelayWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{IntakeMode, IntakeRequest, TriageIntake};
    use crate::transitioner::StatusTransitioner;
    use chrono::Duration as ChronoDuration;
    use triage_core::PatientInfo;

    fn insert_case(registry: &mut CaseRegistry, severity: u8, at: DateTime<Utc>) -> Uuid {
        let case = TriageIntake::default()
            .create_case(
                IntakeRequest {
                    patient: PatientInfo {
                        name: "Bongo Alain".to_string(),
                        age: Some(45),
                        sex: None,
                    },
                    motif: "Traumatisme cheville".to_string(),
                    severity,
                    vitals: None,
                    mode: IntakeMode::Triaged,
                },
                at,
            )
            .unwrap();
        let id = case.id;
        registry.insert(case).unwrap();
        id
    }

    #[test]
    fn test_severity_two_breach_timeline() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        let id = insert_case(&mut registry, 2, arrival);

        let alerts = watcher.scan(&mut registry, arrival + ChronoDuration::minutes(9));
        assert!(alerts.is_empty());
        assert!(!registry.get(id).unwrap().is_breached());

        let alerts = watcher.scan(&mut registry, arrival + ChronoDuration::minutes(11));
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.case_id, id);
        assert_eq!(alert.severity.level(), 2);
        assert_eq!(alert.minutes_over, 1);
        assert!(alert.newly_breached);
        assert!(alert.message.contains("severity 2"));
        assert!(alert.message.contains("1 min over"));
        assert!(registry.get(id).unwrap().is_breached());
    }

    #[test]
    fn test_half_second_past_threshold_reports_one_minute_over() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        insert_case(&mut registry, 2, arrival);

        let now = arrival + ChronoDuration::minutes(10) + ChronoDuration::milliseconds(500);
        let alerts = watcher.scan(&mut registry, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].minutes_over, 1);
        assert!(alerts[0].newly_breached);
        assert!(alerts[0].message.contains("1 min over the 10 min threshold"));
    }

    #[test]
    fn test_exact_threshold_is_not_a_breach() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        insert_case(&mut registry, 2, arrival);

        assert!(watcher
            .scan(&mut registry, arrival + ChronoDuration::minutes(10))
            .is_empty());
    }

    #[test]
    fn test_rescan_does_not_duplicate_alerts() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        let id = insert_case(&mut registry, 3, arrival);
        let now = arrival + ChronoDuration::minutes(45);

        let first = watcher.scan(&mut registry, now);
        let second = watcher.scan(&mut registry, now);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(first[0].newly_breached);
        assert!(!second[0].newly_breached);

        let case = registry.get(id).unwrap();
        assert_eq!(case.alerts.len(), 1);
        assert!(case.alerts.contains(BREACH_TAG));
    }

    #[test]
    fn test_severity_one_is_never_flagged() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        let id = insert_case(&mut registry, 1, arrival);

        let case = registry.get(id).unwrap();
        assert_eq!(case.status, CaseStatus::InConsultation);
        assert_eq!(case.max_wait_minutes, Some(0));

        let alerts = watcher.scan(&mut registry, arrival + ChronoDuration::hours(12));
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_severity_five_has_no_threshold() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        insert_case(&mut registry, 5, arrival);

        assert!(watcher
            .scan(&mut registry, arrival + ChronoDuration::hours(24))
            .is_empty());
    }

    #[test]
    fn test_cases_seen_are_not_flagged() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        let id = insert_case(&mut registry, 2, arrival);

        StatusTransitioner::new()
            .transition(
                &mut registry,
                id,
                CaseStatus::InConsultation,
                None,
                arrival + ChronoDuration::minutes(5),
            )
            .unwrap();

        let alerts = watcher.scan(&mut registry, arrival + ChronoDuration::minutes(30));
        assert!(alerts.is_empty());
        assert_eq!(registry.get(id).unwrap().status, CaseStatus::InConsultation);
    }

    #[test]
    fn test_breach_tag_survives_being_seen() {
        let watcher = DelayWatcher::default();
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        let id = insert_case(&mut registry, 2, arrival);

        watcher.scan(&mut registry, arrival + ChronoDuration::minutes(15));
        StatusTransitioner::new()
            .transition(
                &mut registry,
                id,
                CaseStatus::InConsultation,
                None,
                arrival + ChronoDuration::minutes(16),
            )
            .unwrap();

        assert!(watcher
            .scan(&mut registry, arrival + ChronoDuration::minutes(20))
            .is_empty());
        assert!(registry.get(id).unwrap().is_breached());
    }

    #[test]
    fn test_is_breached_predicate() {
        let mut registry = CaseRegistry::new();
        let arrival = Utc::now();
        let id = insert_case(&mut registry, 4, arrival);
        let case = registry.get(id).unwrap();

        assert!(!DelayWatcher::is_breached(case, arrival + ChronoDuration::minutes(120)));
        assert!(DelayWatcher::is_breached(case, arrival + ChronoDuration::minutes(121)));
    }
}
