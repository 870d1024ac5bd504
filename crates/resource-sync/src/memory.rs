//! 内存实现的源端与 Store
//!
//! 用于演示与集成方测试。`MemorySource` 模拟带资源版本的 watch 源：
//! 每次变更分配递增的版本号，watch 可以从任一未被压缩的版本接续。

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::resource::{Resource, ResourceKey};
use crate::source::{ListScope, ResourceList, ResourceSource, WatchEvent, WatchStream};
use crate::store::ResourceStore;

const DEFAULT_HISTORY_LIMIT: usize = 1024;
const LIVE_CHANNEL_CAPACITY: usize = 256;

type VersionedEvent<T> = (u64, WatchEvent<T>);

struct SourceState<T> {
    objects: BTreeMap<ResourceKey, T>,
    version: u64,
    history: VecDeque<VersionedEvent<T>>,
    /// 已被压缩掉的最大版本；早于它的游标无法接续
    compacted_through: u64,
    live: broadcast::Sender<VersionedEvent<T>>,
}

/// 内存源端
pub struct MemorySource<T> {
    state: Mutex<SourceState<T>>,
    history_limit: usize,
    suppress_delete_events: bool,
}

impl<T: Resource> Default for MemorySource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Resource> MemorySource<T> {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(SourceState {
                objects: BTreeMap::new(),
                version: 0,
                history: VecDeque::new(),
                compacted_through: 0,
                live,
            }),
            history_limit: DEFAULT_HISTORY_LIMIT,
            suppress_delete_events: false,
        }
    }

    /// 保留的历史事件条数
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// 模拟不发送显式删除事件的后端
    pub fn without_delete_events(mut self) -> Self {
        self.suppress_delete_events = true;
        self
    }

    /// 当前资源版本
    pub fn resource_version(&self) -> String {
        self.state.lock().version.to_string()
    }

    /// 新建或修改对象，返回分配的资源版本
    pub fn apply(&self, mut resource: T) -> String {
        let mut state = self.state.lock();
        let version = state.version + 1;
        resource.metadata_mut().resource_version = Some(version.to_string());

        let key = resource.metadata().key();
        let event = if state.objects.contains_key(&key) {
            WatchEvent::Modified(resource.clone())
        } else {
            WatchEvent::Added(resource.clone())
        };
        state.objects.insert(key, resource);
        self.record(&mut state, version, event);
        version.to_string()
    }

    /// 设置 deletion_timestamp（进入待删除窗口），以修改事件通知
    pub fn mark_deleting(&self, key: &ResourceKey, at: DateTime<Utc>) -> Result<String> {
        let mut state = self.state.lock();
        let version = state.version + 1;
        let resource = state
            .objects
            .get_mut(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        let meta = resource.metadata_mut();
        meta.deletion_timestamp = Some(at);
        meta.resource_version = Some(version.to_string());
        let event = WatchEvent::Modified(resource.clone());
        self.record(&mut state, version, event);
        Ok(version.to_string())
    }

    /// 彻底移除对象
    pub fn remove(&self, key: &ResourceKey) -> Result<T> {
        let mut state = self.state.lock();
        let removed = state
            .objects
            .remove(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        let version = state.version + 1;
        if self.suppress_delete_events {
            // 版本仍然前进，只是没有事件
            state.version = version;
        } else {
            self.record(&mut state, version, WatchEvent::Deleted(removed.clone()));
        }
        Ok(removed)
    }

    /// 发送一个心跳事件
    pub fn bookmark(&self) -> String {
        let mut state = self.state.lock();
        let version = state.version + 1;
        let event = WatchEvent::Bookmark {
            resource_version: Some(version.to_string()),
        };
        self.record(&mut state, version, event);
        version.to_string()
    }

    /// 发送一个无法解码的事件
    pub fn push_undecodable(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        let version = state.version + 1;
        self.record(&mut state, version, WatchEvent::Error(message.into()));
    }

    /// 结束所有进行中的 watch
    pub fn disconnect_watchers(&self) {
        let mut state = self.state.lock();
        let (live, _) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        // 旧的发送端被丢弃，接收端随之结束
        state.live = live;
        debug!("内存源端断开所有 watch");
    }

    fn record(&self, state: &mut SourceState<T>, version: u64, event: WatchEvent<T>) {
        state.version = version;
        state.history.push_back((version, event.clone()));
        while state.history.len() > self.history_limit {
            if let Some((evicted, _)) = state.history.pop_front() {
                state.compacted_through = evicted;
            }
        }
        // 没有接收端时发送失败，可以忽略
        let _ = state.live.send((version, event));
    }
}

fn parse_version(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|_| SyncError::InvalidData(format!("无效的资源版本: {}", raw)))
}

fn event_in_scope<T: Resource>(scope: &ListScope, event: &WatchEvent<T>) -> bool {
    match event {
        WatchEvent::Added(r) | WatchEvent::Modified(r) | WatchEvent::Deleted(r) => {
            scope.contains(r.metadata().namespace.as_deref())
        }
        WatchEvent::Bookmark { .. } | WatchEvent::Error(_) => true,
    }
}

#[async_trait]
impl<T: Resource> ResourceSource<T> for MemorySource<T> {
    async fn get(&self, key: &ResourceKey) -> Result<T> {
        self.state
            .lock()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    async fn list(&self, scope: &ListScope) -> Result<ResourceList<T>> {
        let state = self.state.lock();
        let items = state
            .objects
            .values()
            .filter(|r| scope.contains(r.metadata().namespace.as_deref()))
            .cloned()
            .collect();
        Ok(ResourceList::new(items, Some(state.version.to_string())))
    }

    /// `from_version` 为 None 时只接收之后的实时事件
    async fn watch(&self, scope: &ListScope, from_version: Option<&str>) -> Result<WatchStream<T>> {
        let from = from_version.map(parse_version).transpose()?;

        let (replay, receiver, last) = {
            let state = self.state.lock();
            let replay: Vec<WatchEvent<T>> = match from {
                Some(from) => {
                    if from < state.compacted_through {
                        return Err(SyncError::Source(format!(
                            "资源版本 {} 过旧（已压缩至 {}）",
                            from, state.compacted_through
                        )));
                    }
                    state
                        .history
                        .iter()
                        .filter(|(version, event)| *version > from && event_in_scope(scope, event))
                        .map(|(_, event)| event.clone())
                        .collect()
                }
                None => Vec::new(),
            };
            (replay, state.live.subscribe(), state.version)
        };

        let scope = scope.clone();
        let live = stream::unfold((receiver, last, scope), |(mut receiver, last, scope)| async move {
            loop {
                match receiver.recv().await {
                    Ok((version, event)) => {
                        if version <= last || !event_in_scope(&scope, &event) {
                            continue;
                        }
                        return Some((event, (receiver, version, scope)));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // 丢失事件后无法保证顺序，结束 watch 由上层重新订阅
                        warn!("内存源端 watch 落后 {} 条事件，结束 watch", skipped);
                        return None;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream::iter(replay).chain(live).boxed())
    }
}

/// Store 调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upsert(String),
    Delete(String),
}

/// 内存 Store：按 name 保存对象，并记录每一次调用
pub struct MemoryStore<T> {
    items: Mutex<BTreeMap<String, T>>,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<VecDeque<SyncError>>,
}

impl<T: Resource> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Resource> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.items.lock().get(name).cloned()
    }

    /// 已保存的名称（有序）
    pub fn names(&self) -> Vec<String> {
        self.items.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// 让接下来的一次调用失败（可多次调用排队）
    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().push_back(error);
    }

    fn take_failure(&self) -> Result<()> {
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T: Resource> ResourceStore<T> for MemoryStore<T> {
    async fn upsert_by_name(&self, resource: &T) -> Result<()> {
        let name = resource.metadata().name.clone();
        self.calls.lock().push(StoreCall::Upsert(name.clone()));
        self.take_failure()?;
        self.items.lock().insert(name, resource.clone());
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<()> {
        self.calls.lock().push(StoreCall::Delete(name.to_string()));
        self.take_failure()?;
        self.items.lock().remove(name);
        Ok(())
    }
}
