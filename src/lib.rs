//! # 急诊分诊系统
//!
//! 汇总各子模块，供演示程序和外部集成使用

pub use triage_core as domain;
pub use triage_integration as integration;
pub use triage_workflow as workflow;
