//! # 分诊集成模块
//!
//! 提供与外部系统的集成功能，包括：
//! - 托管数据库的通用行接口客户端（内存实现与 REST 实现）
//! - 急诊病例的持久化仓库与有序写入队列
//! - 通知分发器（日志与 Webhook）

pub mod backend;
pub mod notifier;
pub mod repository;
pub mod writer;

pub use backend::{BackendClient, Filter, InMemoryBackend, RestBackend};
pub use notifier::{LogNotifier, WebhookNotifier};
pub use repository::{CaseRepository, DEFAULT_CASES_TABLE};
pub use writer::CaseWriter;
