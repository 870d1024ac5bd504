//! 变更监听器：list 快照 + 实时 watch → 单条归一化的 Create / Update / Delete 流
//!
//! ## NOTE: Watcher 不做重连
//!
//! 流关闭（watch 结束或被取消）后不会自动重新订阅。重新订阅由调用方负责
//! （见 [`crate::controller::SyncController`]）。

use std::marker::PhantomData;
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::classifier::classify_snapshot;
use super::{Update, UpdateType};
use crate::error::SyncError;
use crate::resource::{Resource, ResourceKind};
use crate::source::{ListScope, ResourceSource, WatchEvent, WatchStream};
use crate::stream::{change_stream, ChangeSender, ChangeStream};

/// 单个资源类型的变更监听器
pub struct ResourceWatcher<T, S> {
    kind: ResourceKind,
    source: Arc<S>,
    infer_deletes: bool,
    _resource: PhantomData<fn() -> T>,
}

impl<T, S> ResourceWatcher<T, S>
where
    T: Resource,
    S: ResourceSource<T> + 'static,
{
    pub fn new(kind: ResourceKind, source: Arc<S>) -> Self {
        Self {
            kind,
            source,
            infer_deletes: true,
            _resource: PhantomData,
        }
    }

    /// 是否根据 deletion_timestamp 推断删除（默认开启）
    pub fn with_deletion_inference(mut self, infer: bool) -> Self {
        self.infer_deletes = infer;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// 订阅变更
    ///
    /// 1. `include_bootstrap` 时先 list 一次，并记录其资源版本
    /// 2. 从该版本开始 watch，避免空窗或重复
    /// 3. 先发送全部快照项，再发送实时事件
    ///
    /// list 或 watch 建立失败时，返回一条已关闭并携带该错误的流，不会发送任何事件；
    /// 建立期间被取消时同理，错误为 [`SyncError::Cancelled`]。
    /// 每次调用都是独立的订阅。
    pub async fn watch_updates(
        &self,
        cancel: CancellationToken,
        scope: ListScope,
        include_bootstrap: bool,
    ) -> ChangeStream<Update<T>> {
        let subscription_id = Uuid::new_v4();

        let mut bootstrap = Vec::new();
        let mut from_version = None;
        if include_bootstrap {
            let listed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled_during_setup(self.kind, subscription_id),
                listed = self.source.list(&scope) => listed,
            };
            match listed {
                Ok(list) => {
                    bootstrap = list.items;
                    from_version = list.resource_version;
                }
                Err(e) => {
                    warn!("❌ {} list 失败 (subscription={}): {}", self.kind, subscription_id, e);
                    return ChangeStream::failed(e);
                }
            }
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled_during_setup(self.kind, subscription_id),
            opened = self.source.watch(&scope, from_version.as_deref()) => opened,
        };
        let watch = match opened {
            Ok(watch) => watch,
            Err(e) => {
                warn!("❌ {} watch 建立失败 (subscription={}): {}", self.kind, subscription_id, e);
                return ChangeStream::failed(e);
            }
        };

        info!(
            "🔄 {} 订阅开始 (subscription={}): 快照 {} 条, 起始版本 {:?}",
            self.kind,
            subscription_id,
            bootstrap.len(),
            from_version
        );

        let (sender, stream) = change_stream();
        let kind = self.kind;
        let infer_deletes = self.infer_deletes;
        tokio::spawn(async move {
            let error = normalize(kind, infer_deletes, bootstrap, watch, &sender, &cancel).await;
            debug!("{} 订阅结束 (subscription={}): {:?}", kind, subscription_id, error);
            sender.close(error);
        });
        stream
    }
}

/// 订阅建立期间被取消：返回携带取消原因的已关闭流
fn cancelled_during_setup<T>(kind: ResourceKind, subscription_id: Uuid) -> ChangeStream<Update<T>> {
    debug!("{} 订阅建立期间被取消 (subscription={})", kind, subscription_id);
    ChangeStream::failed(SyncError::Cancelled("watch subscription cancelled".to_string()))
}

/// 归一化循环；返回流的终止错误（None 表示正常结束）
async fn normalize<T: Resource>(
    kind: ResourceKind,
    infer_deletes: bool,
    bootstrap: Vec<T>,
    mut watch: WatchStream<T>,
    sender: &ChangeSender<Update<T>>,
    cancel: &CancellationToken,
) -> Option<SyncError> {
    for item in bootstrap {
        let update_type = classify_snapshot(item.metadata());
        if !deliver(sender, cancel, Update::new(update_type, item)).await {
            return termination(cancel);
        }
    }

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = watch.next() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(update) = normalize_event(kind, infer_deletes, event) else {
            continue;
        };
        if !deliver(sender, cancel, update).await {
            break;
        }
    }
    termination(cancel)
}

/// 发送一条变更；被取消或消费者离开时返回 false
async fn deliver<T>(
    sender: &ChangeSender<Update<T>>,
    cancel: &CancellationToken,
    update: Update<T>,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        result = sender.send(update) => result.is_ok(),
    }
}

fn termination(cancel: &CancellationToken) -> Option<SyncError> {
    if cancel.is_cancelled() {
        Some(SyncError::Cancelled("watch subscription cancelled".to_string()))
    } else {
        None
    }
}

/// 把单个 watch 事件映射为归一化变更；心跳与无法解码的事件返回 None
fn normalize_event<T: Resource>(
    kind: ResourceKind,
    infer_deletes: bool,
    event: WatchEvent<T>,
) -> Option<Update<T>> {
    let (update_type, resource) = match event {
        WatchEvent::Bookmark { .. } => return None,
        WatchEvent::Error(message) => {
            debug!("{} 忽略无法解码的 watch 事件: {}", kind, message);
            return None;
        }
        WatchEvent::Added(resource) => (UpdateType::Create, resource),
        WatchEvent::Modified(resource) => (UpdateType::Update, resource),
        WatchEvent::Deleted(resource) => (UpdateType::Delete, resource),
    };

    // 部分后端不发送删除事件，只设置 deletion_timestamp
    let update_type = if infer_deletes && resource.metadata().is_deleting() {
        UpdateType::Delete
    } else {
        update_type
    };
    Some(Update::new(update_type, resource))
}
