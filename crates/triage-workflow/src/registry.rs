//! 病例登记簿
//!
//! 按到达顺序保存急诊病例，提供按状态、严重程度和关键字的查询以及看板统计

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use triage_core::{Case, CaseStatus, Result, Severity, TriageError};
use uuid::Uuid;

/// 病例查询过滤器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub severity: Option<Severity>,
    pub text: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Default for CaseFilter {
    fn default() -> Self {
        Self {
            status: None,
            severity: None,
            text: None,
            limit: Some(50),
            offset: Some(0),
        }
    }
}

/// 看板统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySummary {
    pub total_cases: usize,
    pub open_cases: usize,
    pub closed_cases: usize,
    pub breached_cases: usize,
    pub by_status: BTreeMap<CaseStatus, usize>,
    pub by_severity: BTreeMap<u8, usize>,
}

/// 病例登记簿
#[derive(Debug, Default)]
pub struct CaseRegistry {
    cases: Vec<Case>,
    index: HashMap<Uuid, usize>, // case_id -> position
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新病例
    pub fn insert(&mut self, case: Case) -> Result<&Case> {
        if self.index.contains_key(&case.id) {
            return Err(TriageError::Validation(format!(
                "case {} is already registered",
                case.id
            )));
        }

        let position = self.cases.len();
        self.index.insert(case.id, position);
        self.cases.push(case);
        Ok(&self.cases[position])
    }

    /// 恢复已持久化的病例
    pub fn restore(&mut self, case: Case) -> Result<()> {
        let reference = case.reference.clone();
        self.insert(case)?;
        tracing::debug!("Restored case {}", reference);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<&Case> {
        self.index.get(&id).map(|&position| &self.cases[position])
    }

    /// 获取病例，不存在时返回 NotFound
    pub fn require(&self, id: Uuid) -> Result<&Case> {
        self.get(id)
            .ok_or_else(|| TriageError::NotFound(format!("Case {} not found", id)))
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut Case> {
        match self.index.get(&id) {
            Some(&position) => self.cases.get_mut(position),
            None => None,
        }
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Case> {
        self.cases.iter_mut()
    }

    /// 按到达顺序列出全部病例
    pub fn list(&self) -> &[Case] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn by_status(&self, status: CaseStatus) -> Vec<&Case> {
        self.cases.iter().filter(|case| case.status == status).collect()
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<&Case> {
        self.cases
            .iter()
            .filter(|case| case.severity == severity)
            .collect()
    }

    /// 按患者姓名、病例ID或急诊号模糊查找（不区分大小写）
    pub fn search(&self, text: &str) -> Vec<&Case> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.cases.iter().collect();
        }

        self.cases
            .iter()
            .filter(|case| Self::matches_text(case, &needle))
            .collect()
    }

    fn matches_text(case: &Case, needle: &str) -> bool {
        case.patient.name.to_lowercase().contains(needle)
            || case.id.to_string().contains(needle)
            || case.reference.to_lowercase().contains(needle)
    }

    /// 组合查询
    pub fn query(&self, filter: &CaseFilter) -> Vec<Case> {
        let needle = filter
            .text
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());

        let items = self.cases.iter().filter(|case| {
            filter.status.map_or(true, |status| case.status == status)
                && filter.severity.map_or(true, |severity| case.severity == severity)
                && needle
                    .as_deref()
                    .map_or(true, |needle| Self::matches_text(case, needle))
        });

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);

        items.skip(offset).take(limit).cloned().collect()
    }

    /// 各状态病例数，未出现的状态计为 0
    pub fn count_by_status(&self) -> BTreeMap<CaseStatus, usize> {
        let mut counts: BTreeMap<CaseStatus, usize> =
            CaseStatus::ALL.iter().map(|status| (*status, 0)).collect();
        for case in &self.cases {
            *counts.entry(case.status).or_insert(0) += 1;
        }
        counts
    }

    /// 各严重程度病例数
    pub fn count_by_severity(&self) -> BTreeMap<u8, usize> {
        let mut counts: BTreeMap<u8, usize> =
            Severity::all().map(|severity| (severity.level(), 0)).collect();
        for case in &self.cases {
            *counts.entry(case.severity.level()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> RegistrySummary {
        let closed_cases = self.cases.iter().filter(|case| case.is_terminal()).count();

        RegistrySummary {
            total_cases: self.cases.len(),
            open_cases: self.cases.len() - closed_cases,
            closed_cases,
            breached_cases: self.cases.iter().filter(|case| case.is_breached()).count(),
            by_status: self.count_by_status(),
            by_severity: self.count_by_severity(),
        }
    }
}
