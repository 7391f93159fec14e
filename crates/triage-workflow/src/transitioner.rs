//! 状态转换执行器
//!
//! 校验目标状态后修改病例状态并追加转换记录

use crate::registry::CaseRegistry;
use crate::state_machine::CaseStateMachine;
use chrono::{DateTime, Utc};
use triage_core::{Case, CaseStatus, Result, TransitionRecord, TriageError};
use uuid::Uuid;

/// 状态转换执行器
#[derive(Debug, Default)]
pub struct StatusTransitioner {
    state_machine: CaseStateMachine,
}

impl StatusTransitioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行状态转换，非法转换时病例保持不变
    pub fn transition(
        &self,
        registry: &mut CaseRegistry,
        case_id: Uuid,
        target: CaseStatus,
        performed_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Case> {
        let case = registry
            .get_mut(case_id)
            .ok_or_else(|| TriageError::NotFound(format!("Case {} not found", case_id)))?;

        let from = case.status;
        let to = match self.state_machine.transition(from, target) {
            Ok(to) => to,
            Err(e) => {
                tracing::warn!(
                    "Rejected transition of case {} from {} to {}",
                    case.reference,
                    from,
                    target
                );
                return Err(e);
            }
        };

        // 时钟回拨时沿用上一条记录的时间，保证转换日志时间单调不减
        let at = now.max(case.last_transition_at());

        case.status = to;
        case.transitions.push(TransitionRecord {
            status: to,
            at,
            performed_by,
        });

        tracing::info!("Case {} status updated from {} to {}", case.reference, from, to);
        Ok(case.clone())
    }

    /// 获取病例当前可转换的目标状态
    pub fn allowed_targets(
        &self,
        registry: &CaseRegistry,
        case_id: Uuid,
    ) -> Result<Vec<CaseStatus>> {
        let case = registry.require(case_id)?;
        Ok(self.state_machine.allowed_targets(case.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{IntakeMode, IntakeRequest, TriageIntake};
    use chrono::Duration;
    use triage_core::PatientInfo;

    fn registry_with_case(severity: u8, now: DateTime<Utc>) -> (CaseRegistry, Uuid) {
        let case = TriageIntake::default()
            .create_case(
                IntakeRequest {
                    patient: PatientInfo {
                        name: "Ella Moussavou".to_string(),
                        age: Some(61),
                        sex: None,
                    },
                    motif: "Dyspnée".to_string(),
                    severity,
                    vitals: None,
                    mode: IntakeMode::Triaged,
                },
                now,
            )
            .unwrap();
        let id = case.id;
        let mut registry = CaseRegistry::new();
        registry.insert(case).unwrap();
        (registry, id)
    }

    #[test]
    fn test_accepted_transitions_are_logged() {
        let start = Utc::now();
        let (mut registry, id) = registry_with_case(3, start);
        let transitioner = StatusTransitioner::new();

        let steps = [
            CaseStatus::InConsultation,
            CaseStatus::InExam,
            CaseStatus::InObservation,
            CaseStatus::Admitted,
        ];
        for (i, target) in steps.iter().enumerate() {
            let now = start + Duration::minutes(5 * (i as i64 + 1));
            let case = transitioner
                .transition(&mut registry, id, *target, Some("nurse-7".to_string()), now)
                .unwrap();
            assert_eq!(case.status, *target);
        }

        let case = registry.get(id).unwrap();
        assert_eq!(case.transitions.len(), steps.len() + 1);
        assert!(case.transitions.windows(2).all(|w| w[0].at <= w[1].at));
        assert_eq!(case.transitions[1].performed_by.as_deref(), Some("nurse-7"));
    }

    #[test]
    fn test_rejected_transition_leaves_case_unchanged() {
        let now = Utc::now();
        let (mut registry, id) = registry_with_case(3, now);
        let transitioner = StatusTransitioner::new();

        transitioner
            .transition(&mut registry, id, CaseStatus::InConsultation, None, now)
            .unwrap();
        transitioner
            .transition(&mut registry, id, CaseStatus::InObservation, None, now)
            .unwrap();
        let before = registry.get(id).unwrap().clone();

        for _ in 0..2 {
            let result =
                transitioner.transition(&mut registry, id, CaseStatus::AwaitingTriage, None, now);
            assert!(matches!(
                result,
                Err(TriageError::InvalidTransition {
                    from: CaseStatus::InObservation,
                    to: CaseStatus::AwaitingTriage
                })
            ));
            assert_eq!(registry.get(id).unwrap(), &before);
        }
    }

    #[test]
    fn test_terminal_state_blocks_further_transitions() {
        let now = Utc::now();
        let (mut registry, id) = registry_with_case(1, now);
        let transitioner = StatusTransitioner::new();

        let case = transitioner
            .transition(&mut registry, id, CaseStatus::Discharged, None, now)
            .unwrap();
        assert_eq!(case.status, CaseStatus::Discharged);

        let result = transitioner.transition(&mut registry, id, CaseStatus::InExam, None, now);
        assert!(matches!(result, Err(TriageError::InvalidTransition { .. })));
        let result = transitioner.transition(&mut registry, id, CaseStatus::Admitted, None, now);
        assert!(matches!(result, Err(TriageError::InvalidTransition { .. })));
        assert_eq!(registry.get(id).unwrap().transitions.len(), 2);
    }

    #[test]
    fn test_unknown_case_is_not_found() {
        let (mut registry, _) = registry_with_case(2, Utc::now());
        let transitioner = StatusTransitioner::new();
        let result = transitioner.transition(
            &mut registry,
            Uuid::new_v4(),
            CaseStatus::InConsultation,
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(TriageError::NotFound(_))));
    }

    #[test]
    fn test_clock_going_backwards_keeps_log_monotonic() {
        let now = Utc::now();
        let (mut registry, id) = registry_with_case(2, now);
        let transitioner = StatusTransitioner::new();

        let case = transitioner
            .transition(
                &mut registry,
                id,
                CaseStatus::InConsultation,
                None,
                now - Duration::minutes(3),
            )
            .unwrap();
        assert_eq!(case.transitions[1].at, now);
    }

    #[test]
    fn test_allowed_targets_for_case() {
        let (registry, id) = registry_with_case(2, Utc::now());
        let transitioner = StatusTransitioner::new();
        assert_eq!(
            transitioner.allowed_targets(&registry, id).unwrap(),
            vec![
                CaseStatus::InConsultation,
                CaseStatus::Discharged,
                CaseStatus::Admitted
            ]
        );
    }
}
