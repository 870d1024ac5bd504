//! 同步调度器
//!
//! 把 Watcher 与 Adapter 连接起来：
//!
//! ```text
//! ResourceWatcher ──键──▶ WorkQueue ──▶ N 个工作协程 ──▶ SyncAdapter::sync
//!        ▲                     ▲                              │ 失败
//!        │ 流关闭后重新订阅     └──── DelayQueue（退避）◀──────┘
//! ```
//!
//! - 同一个键任意时刻只在一个工作协程中处理，不同键并发
//! - 失败按 [`RetryPolicy`] 退避重试；不可重试的错误直接放弃，等待下一次变更
//! - 变更流关闭后（watch 结束或出错）等待 `resubscribe_delay_ms` 再订阅，重新订阅总是带快照
//! - 取消令牌触发后停止订阅、关闭队列并等待工作协程退出

mod retry_policy;
mod work_queue;

pub use retry_policy::RetryPolicy;
pub use work_queue::WorkQueue;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::resource::{Resource, ResourceKey, ResourceKind};
use crate::source::ResourceSource;
use crate::store::ResourceStore;
use crate::sync::{ResourceWatcher, SyncAdapter, SyncStats};
use crate::version::version_line;

type RetryRequest = (ResourceKey, Duration);

/// 调度器统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    /// 已建立的订阅次数（含重新订阅）
    pub subscriptions: u64,
    /// 收到的归一化变更数
    pub updates_received: u64,
    pub retries_scheduled: u64,
    /// 超过最大重试次数或不可重试而放弃的次数
    pub retries_abandoned: u64,
}

/// 单个资源类型的同步调度器
pub struct SyncController<T, S, St> {
    kind: ResourceKind,
    config: SyncConfig,
    watcher: ResourceWatcher<T, S>,
    adapter: Arc<SyncAdapter<T, S, St>>,
    stats: Arc<RwLock<ControllerStats>>,
}

impl<T, S, St> SyncController<T, S, St>
where
    T: Resource,
    S: ResourceSource<T> + 'static,
    St: ResourceStore<T> + 'static,
{
    pub fn new(kind: ResourceKind, source: Arc<S>, store: Arc<St>, config: SyncConfig) -> Self {
        let watcher = ResourceWatcher::new(kind, source.clone())
            .with_deletion_inference(config.watch.infer_deletes);
        let adapter = Arc::new(SyncAdapter::from_config(kind, source, store, &config));
        Self {
            kind,
            config,
            watcher,
            adapter,
            stats: Arc::new(RwLock::new(ControllerStats::default())),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats.read().clone()
    }

    /// Adapter 的同步统计
    pub fn sync_stats(&self) -> SyncStats {
        self.adapter.stats()
    }

    /// 运行直到 `cancel` 被触发
    ///
    /// 每次运行使用独立的工作队列，停止后可以再次调用。
    #[instrument(skip(self, cancel), fields(kind = %self.kind))]
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.config.validate()?;
        let worker_count = self.config.controller.worker_count;
        info!("🚀 启动同步调度器: {}, {} 类型, {} 个工作协程", version_line(), self.kind, worker_count);

        let queue = Arc::new(WorkQueue::new());
        let retry_counts: Arc<Mutex<HashMap<ResourceKey, u32>>> = Arc::new(Mutex::new(HashMap::new()));
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        let retry_pump = tokio::spawn(run_retry_pump(queue.clone(), retry_rx, cancel.clone()));

        let workers: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    queue: queue.clone(),
                    adapter: self.adapter.clone(),
                    policy: self.config.retry.clone(),
                    retry_counts: retry_counts.clone(),
                    retry_tx: retry_tx.clone(),
                    stats: self.stats.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        drop(retry_tx);

        self.watch_loop(&cancel, &queue).await;

        queue.shutdown();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("❌ 工作协程异常退出: {}", e);
            }
        }
        if let Err(e) = retry_pump.await {
            error!("❌ 重试队列处理器异常退出: {}", e);
        }

        info!("✅ {} 同步调度器已停止", self.kind);
        Ok(())
    }

    async fn watch_loop(&self, cancel: &CancellationToken, queue: &WorkQueue) {
        let scope = self.config.scope();
        let resubscribe_delay = Duration::from_millis(self.config.controller.resubscribe_delay_ms);
        let mut include_bootstrap = self.config.watch.include_bootstrap;

        while !cancel.is_cancelled() {
            self.stats.write().subscriptions += 1;
            let mut updates = self
                .watcher
                .watch_updates(cancel.clone(), scope.clone(), include_bootstrap)
                .await;

            while let Some(update) = updates.recv().await {
                self.stats.write().updates_received += 1;
                debug!("{} {} {}", self.kind, update.update_type, update.key());
                queue.add(update.key());
            }

            match updates.err() {
                Some(SyncError::Cancelled(_)) => break,
                Some(e) => warn!("⚠️ {} 变更流异常关闭: {}", self.kind, e),
                None => info!("🔄 {} 变更流已结束，准备重新订阅", self.kind),
            }

            // 断开期间的变更只能靠重新 list 补齐
            include_bootstrap = true;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(resubscribe_delay) => {}
            }
        }
    }
}

struct Worker<T, S, St> {
    id: usize,
    queue: Arc<WorkQueue>,
    adapter: Arc<SyncAdapter<T, S, St>>,
    policy: RetryPolicy,
    retry_counts: Arc<Mutex<HashMap<ResourceKey, u32>>>,
    retry_tx: mpsc::UnboundedSender<RetryRequest>,
    stats: Arc<RwLock<ControllerStats>>,
}

impl<T, S, St> Worker<T, S, St>
where
    T: Resource,
    S: ResourceSource<T> + 'static,
    St: ResourceStore<T> + 'static,
{
    async fn run(self) {
        debug!("Worker {} started", self.id);

        while let Some(key) = self.queue.get().await {
            match self.adapter.sync(&key).await {
                Ok(outcome) => {
                    self.retry_counts.lock().remove(&key);
                    debug!("Worker {} 同步 {}: {:?}", self.id, key, outcome);
                }
                Err(e) => self.handle_failure(&key, e),
            }
            self.queue.done(&key);
        }

        debug!("Worker {} stopped", self.id);
    }

    fn handle_failure(&self, key: &ResourceKey, error: SyncError) {
        let attempt = {
            let mut counts = self.retry_counts.lock();
            let count = counts.entry(key.clone()).or_insert(0);
            let attempt = *count;
            *count += 1;
            attempt
        };

        match self.policy.next_delay(attempt, &error) {
            Some(delay) => {
                warn!(
                    "⚠️ {} 同步失败 (第 {} 次), {:?} 后重试: {}",
                    key,
                    attempt + 1,
                    delay,
                    error
                );
                self.stats.write().retries_scheduled += 1;
                if self.retry_tx.send((key.clone(), delay)).is_err() {
                    debug!("重试队列已关闭，丢弃 {}", key);
                }
            }
            None => {
                error!("❌ {} 同步失败，放弃重试: {}", key, error);
                self.retry_counts.lock().remove(key);
                self.stats.write().retries_abandoned += 1;
            }
        }
    }
}

/// 延迟队列处理器：到期的键重新放回工作队列
async fn run_retry_pump(
    queue: Arc<WorkQueue>,
    mut requests: mpsc::UnboundedReceiver<RetryRequest>,
    cancel: CancellationToken,
) {
    let mut delayed: DelayQueue<ResourceKey> = DelayQueue::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(expired) = delayed.next(), if !delayed.is_empty() => {
                let key = expired.into_inner();
                debug!("Retry time reached for {}", key);
                queue.add(key);
            }
            request = requests.recv() => match request {
                Some((key, delay)) => {
                    delayed.insert(key, delay);
                }
                None => break,
            },
        }
    }

    debug!("Delay queue processor stopped");
}
