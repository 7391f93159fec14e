//! 配置管理
//!
//! 从 TOML 文件和环境变量加载分诊服务配置，并在启动前统一校验

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use triage_workflow::{TriageIntake, WaitThresholds, DEFAULT_POLL_INTERVAL};

/// 环境变量前缀，例如 TRIAGE__SERVER__PORT=8080
pub const ENV_PREFIX: &str = "TRIAGE";

/// 分诊服务完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 分诊规则配置
    pub triage: TriagePolicyConfig,
    /// 后端数据服务配置
    pub backend: BackendConfig,
    /// 通知配置
    pub notifications: NotificationConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 分诊规则配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriagePolicyConfig {
    /// 超时检测轮询间隔（秒）
    pub watcher_interval_secs: u64,
    /// 该级别及更危重的患者接诊时应采集生命体征
    pub vitals_required_up_to: u8,
    /// 各严重程度的最长等待时间
    pub thresholds: WaitThresholds,
}

/// 后端数据服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 是否启用远程后端，关闭时使用内存后端
    pub enabled: bool,
    /// 服务地址
    pub url: Option<String>,
    /// API密钥
    pub api_key: Option<String>,
    /// 病例表名
    pub table: String,
}

/// 通知配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook URL，未配置时仅记录日志
    pub webhook_url: Option<String>,
    /// Webhook 签名密钥
    pub webhook_secret: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（EnvFilter 语法）
    pub level: String,
    /// 日志格式：full / compact / pretty
    pub format: String,
}

impl TriageConfig {
    /// 轮询间隔
    pub fn watcher_interval(&self) -> Duration {
        Duration::from_secs(self.triage.watcher_interval_secs)
    }

    /// 按配置构建接诊处理器
    pub fn build_intake(&self) -> TriageIntake {
        TriageIntake::new(self.triage.thresholds.clone())
            .with_vitals_required_up_to(self.triage.vitals_required_up_to)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for TriagePolicyConfig {
    fn default() -> Self {
        Self {
            watcher_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            vitals_required_up_to: 3,
            thresholds: WaitThresholds::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            api_key: None,
            table: "emergency_cases".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: TriageConfig,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 创建新的配置管理器，未指定文件时只读取环境变量
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config,
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 从文件和环境变量加载配置
    fn load_config(config_path: Option<&str>) -> Result<TriageConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: TriageConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    /// 覆盖部分配置后重新校验
    pub fn update<F>(&mut self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut TriageConfig),
    {
        let mut candidate = self.config.clone();
        apply(&mut candidate);
        self.validator.validate(&candidate)?;
        self.config = candidate;
        Ok(())
    }

    /// 写出默认配置文件
    pub fn write_default_config(path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(&TriageConfig::default())
            .context("Failed to serialize configuration")?;

        std::fs::write(path, config_str)
            .with_context(|| format!("Failed to write configuration file {}", path.display()))?;

        info!("Default configuration written to: {}", path.display());
        Ok(())
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&TriageConfig) -> Result<()>,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "triage.watcher_interval_secs",
                validator: |config| {
                    if config.triage.watcher_interval_secs == 0 {
                        Err(anyhow::anyhow!("Watcher interval must be at least 1 second"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "triage.vitals_required_up_to",
                validator: |config| {
                    if (1..=5).contains(&config.triage.vitals_required_up_to) {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("Vitals bound must be a severity between 1 and 5"))
                    }
                },
            },
            ValidationRule {
                field_path: "triage.thresholds",
                validator: |config| {
                    config
                        .triage
                        .thresholds
                        .validate()
                        .map_err(|e| anyhow::anyhow!(e.to_string()))
                },
            },
            ValidationRule {
                field_path: "backend",
                validator: |config| {
                    let backend = &config.backend;
                    if backend.enabled && (backend.url.is_none() || backend.api_key.is_none()) {
                        Err(anyhow::anyhow!("Remote backend requires both url and api_key"))
                    } else if backend.table.trim().is_empty() {
                        Err(anyhow::anyhow!("Backend table name cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "logging.format",
                validator: |config| match config.logging.format.as_str() {
                    "full" | "compact" | "pretty" => Ok(()),
                    other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &TriageConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
