//! 病例写入队列
//!
//! 调用方在持有引擎写锁时入队病例快照，单个后台任务按入队顺序写入后端，
//! 保证后端行与登记簿的修改顺序一致

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};
use triage_core::Case;

use crate::repository::CaseRepository;

enum WriteOp {
    Create(Box<Case>),
    Save(Box<Case>),
    Flush(oneshot::Sender<()>),
}

/// 有序病例写入器
#[derive(Debug, Clone)]
pub struct CaseWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl CaseWriter {
    /// 启动后台写入任务
    pub fn spawn(repository: CaseRepository) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Create(case) => {
                        if let Err(e) = repository.create(&case).await {
                            error!("Failed to persist case {}: {}", case.reference, e);
                        }
                    }
                    WriteOp::Save(case) => {
                        if let Err(e) = repository.save(&case).await {
                            error!("Failed to save case {}: {}", case.reference, e);
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Case writer for {} stopped", repository.table());
        });

        Self { tx }
    }

    /// 入队新病例
    pub fn create(&self, case: &Case) {
        self.enqueue(WriteOp::Create(Box::new(case.clone())), case);
    }

    /// 入队病例的最新快照
    pub fn save(&self, case: &Case) {
        self.enqueue(WriteOp::Save(Box::new(case.clone())), case);
    }

    /// 等待此前入队的写入全部完成
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    fn enqueue(&self, op: WriteOp, case: &Case) {
        if self.tx.send(op).is_err() {
            error!("Case writer stopped, dropping write for {}", case.reference);
        }
    }
}
