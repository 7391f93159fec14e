//! 急诊流程状态机
//!
//! 管理急诊病例从到达到离院/收住院的状态转换

use std::collections::HashSet;
use triage_core::{CaseStatus, Result, TriageError};

/// 常规流程转换规则
const PIPELINE_EDGES: [(CaseStatus, CaseStatus); 6] = [
    (CaseStatus::AwaitingTriage, CaseStatus::AwaitingConsultation),
    (CaseStatus::AwaitingConsultation, CaseStatus::InConsultation),
    (CaseStatus::InConsultation, CaseStatus::InExam),
    (CaseStatus::InConsultation, CaseStatus::InObservation),
    (CaseStatus::InExam, CaseStatus::InConsultation),
    (CaseStatus::InExam, CaseStatus::InObservation),
];

/// 任一非终止状态都可以直接离院或收住院
const OVERRIDE_TARGETS: [CaseStatus; 2] = [CaseStatus::Discharged, CaseStatus::Admitted];

/// 病例状态机
#[derive(Debug, Clone)]
pub struct CaseStateMachine {
    transitions: HashSet<(CaseStatus, CaseStatus)>,
}

impl CaseStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions: HashSet<_> = PIPELINE_EDGES.iter().copied().collect();

        for from in CaseStatus::ALL.iter().filter(|status| !status.is_terminal()) {
            for to in OVERRIDE_TARGETS {
                transitions.insert((*from, to));
            }
        }

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: CaseStatus, to: CaseStatus) -> bool {
        self.transitions.contains(&(from, to))
    }

    /// 执行状态转换
    pub fn transition(&self, from: CaseStatus, to: CaseStatus) -> Result<CaseStatus> {
        if self.can_transition(from, to) {
            Ok(to)
        } else {
            Err(TriageError::InvalidTransition { from, to })
        }
    }

    /// 获取当前状态的所有合法目标状态，按流程顺序排列
    pub fn allowed_targets(&self, current: CaseStatus) -> Vec<CaseStatus> {
        CaseStatus::ALL
            .iter()
            .copied()
            .filter(|to| self.can_transition(current, *to))
            .collect()
    }
}

impl Default for CaseStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
