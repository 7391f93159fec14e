//! 分诊接诊
//!
//! 采集患者信息、主诉与生命体征，按严重程度生成急诊病例

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use triage_core::utils::generate_case_reference;
use triage_core::{
    Case, CaseStatus, PatientInfo, Result, Severity, TransitionRecord, TriageError, Vitals,
};
use uuid::Uuid;

/// 默认需要采集生命体征的最低危重级别（含）
pub const DEFAULT_VITALS_REQUIRED_UP_TO: u8 = 3;

/// 各严重程度的最长等待时间（分钟），None 表示无上限
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitThresholds {
    pub severity_1: Option<u32>,
    pub severity_2: Option<u32>,
    pub severity_3: Option<u32>,
    pub severity_4: Option<u32>,
    pub severity_5: Option<u32>,
}

impl WaitThresholds {
    /// 查询某一严重程度的等待上限
    pub fn for_severity(&self, severity: Severity) -> Option<u32> {
        match severity.level() {
            1 => self.severity_1,
            2 => self.severity_2,
            3 => self.severity_3,
            4 => self.severity_4,
            _ => self.severity_5,
        }
    }

    /// 等待上限必须随严重程度降低而单调不减，一旦取消上限后续级别也不能再设上限
    pub fn validate(&self) -> Result<()> {
        let mut previous: Option<u32> = Some(0);
        for severity in Severity::all() {
            let current = self.for_severity(severity);
            match (previous, current) {
                (Some(prev), Some(cur)) if cur < prev => {
                    return Err(TriageError::Config(format!(
                        "max wait for severity {} ({} min) is shorter than for a more \
                         severe level ({} min)",
                        severity,
                        cur,
                        prev
                    )));
                }
                (None, Some(cur)) => {
                    return Err(TriageError::Config(format!(
                        "severity {} has a {} min limit although a more severe level has none",
                        severity, cur
                    )));
                }
                _ => {}
            }
            previous = current;
        }
        Ok(())
    }
}

impl Default for WaitThresholds {
    fn default() -> Self {
        Self {
            severity_1: Some(0),
            severity_2: Some(10),
            severity_3: Some(30),
            severity_4: Some(120),
            severity_5: None,
        }
    }
}

/// 接诊方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeMode {
    /// 分诊已完成，直接进入候诊
    #[default]
    Triaged,
    /// 仅在挂号处登记，严重程度为临时评估，等待护士分诊
    Registration,
}

/// 接诊请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRequest {
    pub patient: PatientInfo,
    pub motif: String,
    pub severity: u8,
    #[serde(default)]
    pub vitals: Option<Vitals>,
    #[serde(default)]
    pub mode: IntakeMode,
}

/// 分诊接诊处理器
#[derive(Debug, Clone)]
pub struct TriageIntake {
    thresholds: WaitThresholds,
    vitals_required_up_to: u8,
}

impl TriageIntake {
    pub fn new(thresholds: WaitThresholds) -> Self {
        Self {
            thresholds,
            vitals_required_up_to: DEFAULT_VITALS_REQUIRED_UP_TO,
        }
    }

    pub fn with_vitals_required_up_to(mut self, level: u8) -> Self {
        self.vitals_required_up_to = level;
        self
    }

    pub fn thresholds(&self) -> &WaitThresholds {
        &self.thresholds
    }

    /// 初始状态规则：1 级直接就诊，其余进入候诊或等待分诊
    pub fn initial_status(severity: Severity, mode: IntakeMode) -> CaseStatus {
        if severity.is_immediate() {
            return CaseStatus::InConsultation;
        }
        match mode {
            IntakeMode::Triaged => CaseStatus::AwaitingConsultation,
            IntakeMode::Registration => CaseStatus::AwaitingTriage,
        }
    }

    /// 创建急诊病例
    pub fn create_case(&self, request: IntakeRequest, now: DateTime<Utc>) -> Result<Case> {
        let name = request.patient.name.trim();
        if name.is_empty() {
            return Err(TriageError::Validation("patient name is required".to_string()));
        }

        let motif = request.motif.trim();
        if motif.is_empty() {
            return Err(TriageError::Validation("motif is required".to_string()));
        }

        let severity = Severity::new(request.severity)?;

        if request.vitals.is_none() && severity.level() <= self.vitals_required_up_to {
            tracing::warn!(
                "Vitals missing for severity {} intake of patient {}",
                severity,
                name
            );
        }

        let vitals = request.vitals.map(|mut vitals| {
            vitals.pain_score = vitals.pain_score.map(|score| score.min(10));
            vitals
        });

        let id = Uuid::new_v4();
        let status = Self::initial_status(severity, request.mode);

        let case = Case {
            id,
            reference: generate_case_reference(now, &id),
            patient: PatientInfo {
                name: name.to_string(),
                ..request.patient
            },
            arrival_time: now,
            motif: motif.to_string(),
            severity,
            vitals,
            status,
            max_wait_minutes: self.thresholds.for_severity(severity),
            alerts: BTreeSet::new(),
            transitions: vec![TransitionRecord {
                status,
                at: now,
                performed_by: None,
            }],
        };

        tracing::info!(
            "Created case {} ({}) with severity {} in status {}",
            case.reference,
            case.id,
            severity,
            status
        );
        Ok(case)
    }
}

impl Default for TriageIntake {
    fn default() -> Self {
        Self::new(WaitThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(severity: u8) -> IntakeRequest {
        IntakeRequest {
            patient: PatientInfo {
                name: "Ndong Marie".to_string(),
                age: Some(34),
                sex: None,
            },
            motif: "Douleur thoracique".to_string(),
            severity,
            vitals: None,
            mode: IntakeMode::Triaged,
        }
    }

    #[test]
    fn test_threshold_table_and_initial_status() {
        let intake = TriageIntake::default();
        let now = Utc::now();

        let expected = [
            (1, Some(0), CaseStatus::InConsultation),
            (2, Some(10), CaseStatus::AwaitingConsultation),
            (3, Some(30), CaseStatus::AwaitingConsultation),
            (4, Some(120), CaseStatus::AwaitingConsultation),
            (5, None, CaseStatus::AwaitingConsultation),
        ];

        for (severity, max_wait, status) in expected {
            let case = intake.create_case(request(severity), now).unwrap();
            assert_eq!(case.max_wait_minutes, max_wait, "severity {}", severity);
            assert_eq!(case.status, status, "severity {}", severity);
            assert_eq!(case.arrival_time, now);
            assert_eq!(case.transitions.len(), 1);
            assert_eq!(case.transitions[0].status, status);
            assert!(case.alerts.is_empty());
        }
    }

    #[test]
    fn test_registration_mode_waits_for_triage() {
        let intake = TriageIntake::default();
        let mut req = request(3);
        req.mode = IntakeMode::Registration;
        let case = intake.create_case(req, Utc::now()).unwrap();
        assert_eq!(case.status, CaseStatus::AwaitingTriage);

        let mut req = request(1);
        req.mode = IntakeMode::Registration;
        let case = intake.create_case(req, Utc::now()).unwrap();
        assert_eq!(case.status, CaseStatus::InConsultation);
    }

    #[test]
    fn test_rejects_empty_fields() {
        let intake = TriageIntake::default();

        let mut req = request(2);
        req.motif = "   ".to_string();
        assert!(matches!(
            intake.create_case(req, Utc::now()),
            Err(TriageError::Validation(_))
        ));

        let mut req = request(2);
        req.patient.name = String::new();
        assert!(matches!(
            intake.create_case(req, Utc::now()),
            Err(TriageError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_severity() {
        let intake = TriageIntake::default();
        assert!(matches!(
            intake.create_case(request(0), Utc::now()),
            Err(TriageError::Validation(_))
        ));
        assert!(intake.create_case(request(6), Utc::now()).is_err());
    }

    #[test]
    fn test_missing_vitals_is_not_rejected() {
        let intake = TriageIntake::default();
        assert!(intake.create_case(request(2), Utc::now()).is_ok());
    }

    #[test]
    fn test_pain_score_is_clamped() {
        let intake = TriageIntake::default();
        let mut req = request(3);
        req.vitals = Some(Vitals {
            heart_rate: Some(118),
            pain_score: Some(14),
            ..Default::default()
        });
        let case = intake.create_case(req, Utc::now()).unwrap();
        let vitals = case.vitals.unwrap();
        assert_eq!(vitals.pain_score, Some(10));
        assert_eq!(vitals.heart_rate, Some(118));
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = WaitThresholds {
            severity_3: Some(45),
            ..Default::default()
        };
        let intake = TriageIntake::new(thresholds);
        let case = intake.create_case(request(3), Utc::now()).unwrap();
        assert_eq!(case.max_wait_minutes, Some(45));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(WaitThresholds::default().validate().is_ok());

        let decreasing = WaitThresholds {
            severity_3: Some(5),
            ..Default::default()
        };
        assert!(decreasing.validate().is_err());

        let gap = WaitThresholds {
            severity_4: None,
            severity_5: Some(240),
            ..Default::default()
        };
        assert!(gap.validate().is_err());
    }
}
