//! 超时检测轮询任务
//!
//! 由宿主进程持有，按固定间隔对共享引擎执行超时扫描

use crate::engine::{ScanReport, TriageEngine};
use crate::notification::{dispatch_detached, NotificationDispatcher};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 轮询任务句柄
#[derive(Debug)]
pub struct WatcherHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// 停止轮询并等待任务退出
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!("Delay watcher task ended abnormally: {}", e);
        }
    }
}

/// 启动超时检测轮询，间隔取自引擎的 `DelayWatcher`
///
/// `observer` 在每次扫描后、释放写锁前调用，用于更新指标和按序持久化
pub fn spawn_delay_watcher<F>(
    engine: Arc<RwLock<TriageEngine>>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    observer: F,
) -> WatcherHandle
where
    F: Fn(&TriageEngine, &ScanReport) + Send + Sync + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        let period = engine.read().await.watcher().poll_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Delay watcher started with period {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = {
                        let mut engine = engine.write().await;
                        let report = engine.scan_delays();
                        observer(&*engine, &report);
                        report
                    };

                    if !report.notifications.is_empty() {
                        tracing::info!(
                            "Requesting {} breach notifications",
                            report.notifications.len()
                        );
                        dispatch_detached(dispatcher.clone(), report.notifications);
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Delay watcher stopped");
    });

    WatcherHandle { stop_tx, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay_watcher::DelayWatcher;
    use crate::intake::{IntakeMode, IntakeRequest, TriageIntake};
    use crate::notification::{NotificationKind, NotificationRequest};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use triage_core::{ManualClock, PatientInfo};

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<NotificationRequest>>,
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn dispatch(&self, request: &NotificationRequest) -> triage_core::Result<()> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_polling_dispatches_breach_once_and_stops() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = Arc::new(RwLock::new(TriageEngine::new(
            clock.clone(),
            TriageIntake::default(),
            DelayWatcher::new(Duration::from_millis(20)),
        )));

        engine
            .write()
            .await
            .register_case(IntakeRequest {
                patient: PatientInfo {
                    name: "Nguema Rose".to_string(),
                    age: Some(29),
                    sex: None,
                },
                motif: "Hémorragie".to_string(),
                severity: 2,
                vitals: None,
                mode: IntakeMode::Triaged,
            })
            .unwrap();
        clock.advance(chrono::Duration::minutes(11));

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let scans = Arc::new(AtomicUsize::new(0));
        let scans_seen = scans.clone();

        let handle = spawn_delay_watcher(
            engine.clone(),
            dispatcher.clone(),
            move |_engine, _report| {
                scans_seen.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop().await;

        assert!(scans.load(Ordering::SeqCst) >= 2);
        assert!(engine.read().await.registry().list()[0].is_breached());

        let sent = dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::WaitBreach);
    }
}
