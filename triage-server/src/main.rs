//! 急诊分诊服务器主程序

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use triage_admin::{init_tracing, BackendConfig, ConfigManager, NotificationConfig, SystemManager};
use triage_core::SystemClock;
use triage_integration::{
    BackendClient, CaseRepository, CaseWriter, InMemoryBackend, LogNotifier, RestBackend,
    WebhookNotifier,
};
use triage_web::{AppState, WebServer};
use triage_workflow::{spawn_delay_watcher, DelayWatcher, NotificationDispatcher, TriageEngine};

/// 分诊服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "triage-server")]
#[command(about = "急诊分诊与入院流程管理服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听主机，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 写出默认配置文件后退出
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.init_config {
        ConfigManager::write_default_config(path)?;
        println!("默认配置已写入 {}", path.display());
        return Ok(());
    }

    let mut system = SystemManager::new(args.config.as_deref())?;
    system.config_manager_mut().update(|config| {
        if let Some(host) = &args.host {
            config.server.host = host.clone();
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
        if let Some(level) = &args.log_level {
            config.logging.level = level.clone();
        }
    })?;
    let config = system.config().clone();

    // 初始化日志
    init_tracing(&config.logging)?;
    info!("启动分诊服务器...");

    let mut engine = TriageEngine::new(
        Arc::new(SystemClock),
        config.build_intake(),
        DelayWatcher::new(config.watcher_interval()),
    );

    let repository = CaseRepository::new(build_backend(&config.backend)?, &config.backend.table);
    let restored = repository
        .load_all()
        .await
        .context("Failed to load persisted cases")?;
    engine.restore_cases(restored)?;

    let notifier = build_notifier(&config.notifications);

    info!("分诊服务器配置:");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  超时检测间隔: {:?}", config.watcher_interval());
    info!("  病例表: {}", repository.table());

    let writer = CaseWriter::spawn(repository);
    let state = AppState {
        engine: Arc::new(RwLock::new(engine)),
        writer: Some(writer.clone()),
        notifier: notifier.clone(),
        metrics: system.metrics().clone(),
    };

    let observer_state = state.clone();
    let watcher = spawn_delay_watcher(
        state.engine.clone(),
        notifier,
        move |engine, report| observer_state.handle_scan_report(engine, report),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let result = WebServer::new(addr, state).run(shutdown_signal()).await;
    watcher.stop().await;
    writer.flush().await;

    info!("分诊服务器已停止");
    result
}

/// 根据配置选择后端
fn build_backend(config: &BackendConfig) -> Result<Arc<dyn BackendClient>> {
    if !config.enabled {
        warn!("Remote backend disabled, cases are kept in memory only");
        return Ok(Arc::new(InMemoryBackend::new()));
    }

    let url = config.url.as_deref().context("backend.url is required")?;
    let api_key = config
        .api_key
        .as_deref()
        .context("backend.api_key is required")?;

    info!("Using remote backend at {}", url);
    Ok(Arc::new(RestBackend::new(url, api_key)))
}

/// 根据配置选择通知通道
fn build_notifier(config: &NotificationConfig) -> Arc<dyn NotificationDispatcher> {
    let Some(url) = &config.webhook_url else {
        return Arc::new(LogNotifier);
    };

    info!("Notifications delivered to webhook {}", url);
    Arc::new(WebhookNotifier::new(url, config.webhook_secret.clone()))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到停止信号，正在关闭..."),
        Err(e) => {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
