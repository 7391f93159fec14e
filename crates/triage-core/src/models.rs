//! 核心数据模型定义

use crate::error::{Result, TriageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 超时告警标签
pub const BREACH_TAG: &str = "breach";

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientInfo {
    pub name: String,         // 患者姓名
    pub age: Option<u16>,     // 年龄
    pub sex: Option<Sex>,     // 性别
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// 分诊严重程度（1 最危重，5 非紧急）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// 创建严重程度，超出 1-5 范围时返回验证错误
    pub fn new(level: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(TriageError::Validation(format!(
                "severity must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                level
            )))
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// 分级名称
    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "immediate",
            2 => "very urgent",
            3 => "urgent",
            4 => "standard",
            _ => "non-urgent",
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.0 == Self::MIN
    }

    /// 按危重程度从高到低列出所有级别
    pub fn all() -> impl Iterator<Item = Severity> {
        (Self::MIN..=Self::MAX).map(Severity)
    }
}

impl TryFrom<u8> for Severity {
    type Error = TriageError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 急诊流程状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    AwaitingTriage,       // 等待分诊
    AwaitingConsultation, // 等待就诊
    InConsultation,       // 就诊中
    InExam,               // 检查中
    InObservation,        // 留观
    Discharged,           // 已离院
    Admitted,             // 已收住院
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 7] = [
        CaseStatus::AwaitingTriage,
        CaseStatus::AwaitingConsultation,
        CaseStatus::InConsultation,
        CaseStatus::InExam,
        CaseStatus::InObservation,
        CaseStatus::Discharged,
        CaseStatus::Admitted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::AwaitingTriage => "awaiting_triage",
            CaseStatus::AwaitingConsultation => "awaiting_consultation",
            CaseStatus::InConsultation => "in_consultation",
            CaseStatus::InExam => "in_exam",
            CaseStatus::InObservation => "in_observation",
            CaseStatus::Discharged => "discharged",
            CaseStatus::Admitted => "admitted",
        }
    }

    /// 终止状态没有任何出边
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Discharged | CaseStatus::Admitted)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        CaseStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TriageError::Validation(format!("unknown case status: {}", s)))
    }
}

/// 生命体征快照，仅在接诊时采集一次
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    pub systolic_bp: Option<u16>,        // 收缩压 mmHg
    pub diastolic_bp: Option<u16>,       // 舒张压 mmHg
    pub heart_rate: Option<u16>,         // 心率 次/分
    pub temperature_celsius: Option<f32>,
    pub spo2_percent: Option<u8>,        // 血氧饱和度
    pub pain_score: Option<u8>,          // 疼痛评分 0-10
}

/// 状态转换记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionRecord {
    pub status: CaseStatus,
    pub at: DateTime<Utc>,
    pub performed_by: Option<String>, // 操作人员ID
}

/// 急诊病例，对应患者的一次急诊就诊
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    pub id: Uuid,
    pub reference: String, // 急诊号
    pub patient: PatientInfo,
    pub arrival_time: DateTime<Utc>,
    pub motif: String, // 主诉
    pub severity: Severity,
    pub vitals: Option<Vitals>,
    pub status: CaseStatus,
    pub max_wait_minutes: Option<u32>, // None 表示无等待上限
    pub alerts: BTreeSet<String>,
    pub transitions: Vec<TransitionRecord>,
}

impl Case {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_breached(&self) -> bool {
        self.alerts.contains(BREACH_TAG)
    }

    /// 自到达起经过的整分钟数
    pub fn waited_minutes(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.arrival_time).num_minutes()
    }

    /// 最近一次状态变化时间
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        self.transitions
            .last()
            .map(|record| record.at)
            .unwrap_or(self.arrival_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bounds() {
        assert!(Severity::new(0).is_err());
        assert!(Severity::new(6).is_err());
        assert_eq!(Severity::new(3).unwrap().level(), 3);
        assert_eq!(Severity::all().count(), 5);
    }

    #[test]
    fn test_severity_deserialize_rejects_out_of_range() {
        let ok: Severity = serde_json::from_str("2").unwrap();
        assert_eq!(ok.level(), 2);
        assert!(serde_json::from_str::<Severity>("9").is_err());
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in CaseStatus::ALL {
            assert_eq!(status.as_str().parse::<CaseStatus>().unwrap(), status);
        }
        assert!("waiting".parse::<CaseStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&CaseStatus::InObservation).unwrap(),
            "\"in_observation\""
        );
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = CaseStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&CaseStatus::Discharged, &CaseStatus::Admitted]);
    }
}
