//! 后端数据服务客户端
//!
//! 通过托管数据库服务的通用行接口（insert/update/select）读写数据，支持：
//! - 内存实现，用于测试和离线运行
//! - REST 实现，对接 PostgREST 风格的托管数据库

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error};
use triage_core::{Result, TriageError};
use uuid::Uuid;

/// 等值过滤条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// 后端行存储接口
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// 获取后端名称
    fn name(&self) -> &str;

    /// 插入一行，返回带ID的行
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// 按ID部分更新一行，返回更新后的行
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value>;

    /// 按等值条件查询
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>>;
}

/// 内存后端
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn column_matches(row: &Value, filter: &Filter) -> bool {
        match row.get(&filter.column) {
            Some(Value::String(s)) => *s == filter.value,
            Some(other) => other.to_string() == filter.value,
            None => false,
        }
    }

    fn row_id(row: &Value) -> Option<&str> {
        row.get("id").and_then(Value::as_str)
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let Value::Object(mut fields) = row else {
            return Err(TriageError::Backend(format!(
                "row inserted into {} must be a JSON object",
                table
            )));
        };

        let existing = fields.get("id").and_then(Value::as_str).map(str::to_string);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                fields.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|row| Self::row_id(row) == Some(id.as_str())) {
            return Err(TriageError::Backend(format!(
                "duplicate id {} in table {}",
                id, table
            )));
        }

        let row = Value::Object(fields);
        rows.push(row.clone());
        debug!("Inserted row {} into {}", id, table);
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let Value::Object(patch) = patch else {
            return Err(TriageError::Backend(format!(
                "patch for {} must be a JSON object",
                table
            )));
        };

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| Self::row_id(row) == Some(id)))
            .ok_or_else(|| TriageError::NotFound(format!("Row {} not found in {}", id, table)))?;

        if let Value::Object(fields) = &mut *row {
            for (key, value) in patch {
                fields.insert(key, value);
            }
        }

        debug!("Updated row {} in {}", id, table);
        Ok(row.clone())
    }

    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| Self::column_matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }
}

/// REST 后端（PostgREST 风格）
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn eq_query(filters: &[Filter]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect()
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    async fn read_rows(response: reqwest::Response, action: &str) -> Result<Vec<Value>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Backend {} failed with status {}: {}", action, status, body);
            return Err(TriageError::Backend(format!(
                "{} failed with status {}",
                action, status
            )));
        }

        match response.json::<Value>().await {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(row @ Value::Object(_)) => Ok(vec![row]),
            Ok(other) => Err(TriageError::Backend(format!(
                "unexpected {} response: {}",
                action, other
            ))),
            Err(e) => Err(TriageError::Backend(format!("invalid {} response: {}", action, e))),
        }
    }
}

#[async_trait]
impl BackendClient for RestBackend {
    fn name(&self) -> &str {
        "rest"
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let response = self
            .authorize(self.client.post(self.table_url(table)))
            .json(&row)
            .send()
            .await
            .map_err(|e| TriageError::Backend(format!("insert into {} failed: {}", table, e)))?;

        Self::read_rows(response, "insert")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::Backend(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        let response = self
            .authorize(self.client.patch(self.table_url(table)))
            .query(&Self::eq_query(&[Filter::eq("id", id)]))
            .json(&patch)
            .send()
            .await
            .map_err(|e| TriageError::Backend(format!("update of {} failed: {}", table, e)))?;

        Self::read_rows(response, "update")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::NotFound(format!("Row {} not found in {}", id, table)))
    }

    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        query.extend(Self::eq_query(filters));

        let response = self
            .authorize(self.client.get(self.table_url(table)))
            .query(&query)
            .send()
            .await
            .map_err(|e| TriageError::Backend(format!("select from {} failed: {}", table, e)))?;

        Self::read_rows(response, "select").await
    }
}

/// 把结构体转换为 JSON 对象
pub(crate) fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(TriageError::Internal(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}
