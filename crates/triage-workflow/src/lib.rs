//! # 急诊分诊工作流模块
//!
//! 提供急诊患者流程管理功能，包括：
//! - 分诊接诊：采集患者信息并按严重程度生成病例
//! - 病例登记簿：按到达顺序保存病例并提供查询与统计
//! - 状态机：管理病例从候诊到离院/收住院的状态转换
//! - 超时检测：定期发现超过最长等待时间的候诊病例

pub mod delay_watcher;
pub mod engine;
pub mod intake;
pub mod notification;
pub mod polling;
pub mod registry;
pub mod state_machine;
pub mod transitioner;

// 重新导出主要类型
pub use delay_watcher::{DelayAlert, DelayWatcher, DEFAULT_POLL_INTERVAL};
pub use engine::{IntakeOutcome, ScanReport, TriageEngine};
pub use intake::{IntakeMode, IntakeRequest, TriageIntake, WaitThresholds};
pub use notification::{
    dispatch_detached, NotificationDispatcher, NotificationKind, NotificationRequest,
};
pub use polling::{spawn_delay_watcher, WatcherHandle};
pub use registry::{CaseFilter, CaseRegistry, RegistrySummary};
pub use state_machine::CaseStateMachine;
pub use transitioner::StatusTransitioner;
