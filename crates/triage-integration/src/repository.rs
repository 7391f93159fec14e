//! 病例持久化
//!
//! 将急诊病例映射为后端数据表中的行

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use triage_core::{Case, Result};

use crate::backend::{to_object, BackendClient};

/// 默认病例表名
pub const DEFAULT_CASES_TABLE: &str = "emergency_cases";

/// 病例仓库
#[derive(Clone)]
pub struct CaseRepository {
    backend: Arc<dyn BackendClient>,
    table: String,
}

impl std::fmt::Debug for CaseRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseRepository")
            .field("backend", &self.backend.name())
            .field("table", &self.table)
            .finish()
    }
}

impl CaseRepository {
    pub fn new(backend: Arc<dyn BackendClient>, table: &str) -> Self {
        Self {
            backend,
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 写入新病例
    pub async fn create(&self, case: &Case) -> Result<()> {
        let row = Value::Object(to_object(case)?);
        self.backend.insert(&self.table, row).await?;
        debug!("Persisted case {} to {}", case.reference, self.table);
        Ok(())
    }

    /// 同步病例的可变字段（状态、告警、转换记录）
    pub async fn save(&self, case: &Case) -> Result<()> {
        let patch = json!({
            "status": case.status,
            "alerts": case.alerts,
            "transitions": case.transitions,
        });
        self.backend
            .update(&self.table, &case.id.to_string(), patch)
            .await?;
        debug!("Saved case {} status {}", case.reference, case.status);
        Ok(())
    }

    /// 读取全部病例，按到达时间排序
    pub async fn load_all(&self) -> Result<Vec<Case>> {
        let rows = self.backend.select(&self.table, &[]).await?;
        let mut cases = rows
            .into_iter()
            .map(serde_json::from_value::<Case>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        cases.sort_by_key(|case| case.arrival_time);

        info!("Loaded {} cases from {}", cases.len(), self.table);
        Ok(cases)
    }
}
