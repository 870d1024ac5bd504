//! 测试用的脚本化源端

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use crate::error::{Result, SyncError};
use crate::resource::{Object, ResourceKey};
use crate::source::{ListScope, ResourceList, ResourceSource, WatchEvent, WatchStream};

pub(crate) type TestObject = Object<serde_json::Value>;

enum WatchScript {
    /// 每次 watch 都重放这些事件后结束
    Events(Vec<WatchEvent<TestObject>>),
    /// 永不结束、没有事件
    Pending,
    /// watch 建立调用本身永不返回
    HangOnOpen,
    Fail(SyncError),
}

pub(crate) struct ScriptedSource {
    list: Mutex<Result<ResourceList<TestObject>>>,
    hang_list: AtomicBool,
    watch: Mutex<WatchScript>,
    objects: Mutex<HashMap<String, Result<TestObject>>>,
    list_calls: AtomicUsize,
    watch_calls: Mutex<Vec<Option<String>>>,
    get_calls: Mutex<Vec<ResourceKey>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self {
            list: Mutex::new(Ok(ResourceList::default())),
            hang_list: AtomicBool::new(false),
            watch: Mutex::new(WatchScript::Events(Vec::new())),
            objects: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            watch_calls: Mutex::new(Vec::new()),
            get_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_list(self, items: Vec<TestObject>, resource_version: Option<&str>) -> Self {
        *self.list.lock() = Ok(ResourceList::new(items, resource_version.map(String::from)));
        self
    }

    pub(crate) fn with_list_error(self, error: SyncError) -> Self {
        *self.list.lock() = Err(error);
        self
    }

    /// list 调用永不返回
    pub(crate) fn with_hanging_list(self) -> Self {
        self.hang_list.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_hanging_watch_open(self) -> Self {
        *self.watch.lock() = WatchScript::HangOnOpen;
        self
    }

    pub(crate) fn with_watch(self, events: Vec<WatchEvent<TestObject>>) -> Self {
        *self.watch.lock() = WatchScript::Events(events);
        self
    }

    pub(crate) fn with_pending_watch(self) -> Self {
        *self.watch.lock() = WatchScript::Pending;
        self
    }

    pub(crate) fn with_watch_error(self, error: SyncError) -> Self {
        *self.watch.lock() = WatchScript::Fail(error);
        self
    }

    pub(crate) fn with_object(self, object: TestObject) -> Self {
        self.objects
            .lock()
            .insert(object.metadata.name.clone(), Ok(object));
        self
    }

    pub(crate) fn with_get_error(self, name: &str, error: SyncError) -> Self {
        self.objects.lock().insert(name.to_string(), Err(error));
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn watch_calls(&self) -> Vec<Option<String>> {
        self.watch_calls.lock().clone()
    }

    pub(crate) fn get_calls(&self) -> Vec<ResourceKey> {
        self.get_calls.lock().clone()
    }
}

#[async_trait]
impl ResourceSource<TestObject> for ScriptedSource {
    async fn get(&self, key: &ResourceKey) -> Result<TestObject> {
        self.get_calls.lock().push(key.clone());
        self.objects
            .lock()
            .get(&key.name)
            .cloned()
            .unwrap_or_else(|| Err(SyncError::NotFound(key.to_string())))
    }

    async fn list(&self, _scope: &ListScope) -> Result<ResourceList<TestObject>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_list.load(Ordering::SeqCst) {
            future::pending::<()>().await;
        }
        self.list.lock().clone()
    }

    async fn watch(
        &self,
        _scope: &ListScope,
        from_version: Option<&str>,
    ) -> Result<WatchStream<TestObject>> {
        self.watch_calls.lock().push(from_version.map(String::from));
        let opened = match &*self.watch.lock() {
            WatchScript::Events(events) => Some(Ok(stream::iter(events.clone()).boxed())),
            WatchScript::Pending => Some(Ok(stream::pending().boxed())),
            WatchScript::Fail(error) => Some(Err(error.clone())),
            WatchScript::HangOnOpen => None,
        };
        match opened {
            Some(result) => result,
            None => {
                future::pending::<()>().await;
                Err(SyncError::StreamClosed)
            }
        }
    }
}
