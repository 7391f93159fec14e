//! # 分诊运维模块
//!
//! 提供配置管理、日志初始化和 Prometheus 指标等运维功能

pub mod config;
pub mod logging;
pub mod monitoring;

pub use config::{
    BackendConfig, ConfigManager, ConfigValidator, LoggingConfig, NotificationConfig,
    ServerConfig, TriageConfig, TriagePolicyConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use monitoring::{HealthLevel, HealthStatus, TriageMetrics};

use anyhow::Result;
use std::sync::Arc;

/// 系统管理器
///
/// 集成配置与监控的统一入口点
#[derive(Debug)]
pub struct SystemManager {
    /// 配置管理器
    config_manager: ConfigManager,
    /// 指标收集器
    metrics: Arc<TriageMetrics>,
}

impl SystemManager {
    /// 创建新的系统管理器
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config_manager = ConfigManager::new(config_path)?;
        let metrics = Arc::new(TriageMetrics::new()?);

        Ok(Self {
            config_manager,
            metrics,
        })
    }

    pub fn config(&self) -> &TriageConfig {
        self.config_manager.config()
    }

    pub fn config_manager_mut(&mut self) -> &mut ConfigManager {
        &mut self.config_manager
    }

    pub fn metrics(&self) -> &Arc<TriageMetrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_manager_defaults() {
        let mut manager = SystemManager::new(None).unwrap();
        assert_eq!(manager.config().server.port, 8080);
        manager
            .config_manager_mut()
            .update(|config| config.server.host = "127.0.0.1".to_string())
            .unwrap();
        assert_eq!(manager.config().server.host, "127.0.0.1");
        assert!(manager.metrics().get_prometheus_metrics().is_ok());
    }
}
