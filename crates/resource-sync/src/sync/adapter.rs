//! 同步适配器 - 将单个对象（或它的缺失）写入 Store
//!
//! 由调度层按键调用，每次最多一次 Store 变更：
//!
//! 1. 从源端 get
//! 2. 不存在 → `delete_by_name`，视为成功
//! 3. 其他读取错误 → 原样返回，由调度层决定是否重试
//! 4. 已设置 deletion_timestamp（待删除窗口，不可逆）→ `delete_by_name`
//! 5. 带有跳过标记 → 不调用 Store
//! 6. 否则 `upsert_by_name`（新建与修改走同一个调用）
//!
//! ## NOTE: Adapter 不做重试
//!
//! SyncAdapter 不做重试，也不加锁。同键串行、重试与退避由驱动它的调度层负责。

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::SkipMarker;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::resource::{Resource, ResourceKey, ResourceKind};
use crate::source::ResourceSource;
use crate::store::ResourceStore;

/// 单次同步的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// 已写入 Store
    Upserted,
    /// 源端不存在，已从 Store 删除
    Deleted,
    /// 源端处于待删除窗口，已从 Store 删除
    DeletedPending,
    /// 带有跳过标记，未调用 Store
    Skipped,
}

/// 同步统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// 同步调用总数
    pub syncs: u64,
    pub upserts: u64,
    /// 因源端不存在而删除
    pub deletes: u64,
    /// 因待删除窗口而删除
    pub pending_deletes: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl SyncStats {
    /// 成功率
    pub fn success_rate(&self) -> f64 {
        if self.syncs == 0 {
            0.0
        } else {
            (self.syncs - self.errors) as f64 / self.syncs as f64
        }
    }
}

/// 单个资源类型的同步适配器
pub struct SyncAdapter<T, S, St> {
    kind: ResourceKind,
    source: Arc<S>,
    store: Arc<St>,
    skip_marker: Option<SkipMarker>,
    stats: RwLock<SyncStats>,
    _resource: PhantomData<fn() -> T>,
}

impl<T, S, St> SyncAdapter<T, S, St>
where
    T: Resource,
    S: ResourceSource<T>,
    St: ResourceStore<T>,
{
    /// 创建适配器，默认检查跳过标记
    pub fn new(kind: ResourceKind, source: Arc<S>, store: Arc<St>) -> Self {
        Self {
            kind,
            source,
            store,
            skip_marker: Some(SkipMarker::default()),
            stats: RwLock::new(SyncStats::default()),
            _resource: PhantomData,
        }
    }

    /// 按配置创建（跳过标记的注解键与是否启用）
    pub fn from_config(kind: ResourceKind, source: Arc<S>, store: Arc<St>, config: &SyncConfig) -> Self {
        Self::new(kind, source, store).with_skip_marker(config.skip_marker.marker_for(kind))
    }

    /// 设置跳过标记；None 表示该类型不检查
    pub fn with_skip_marker(mut self, marker: Option<SkipMarker>) -> Self {
        self.skip_marker = marker;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// 同步一个键
    #[instrument(skip(self, key), fields(kind = %self.kind, key = %key))]
    pub async fn sync(&self, key: &ResourceKey) -> Result<SyncOutcome> {
        let result = self.reconcile(key).await;
        self.record(&result);
        result
    }

    async fn reconcile(&self, key: &ResourceKey) -> Result<SyncOutcome> {
        let resource = match self.source.get(key).await {
            Ok(resource) => resource,
            Err(e) if e.is_not_found() => {
                // Store 侧只按 name 寻址
                self.store.delete_by_name(&key.name).await?;
                info!("🗑️ {} {} 已不存在，已从 Store 删除", self.kind, key.name);
                return Ok(SyncOutcome::Deleted);
            }
            Err(e) => {
                warn!("⚠️ {} {} 读取失败: {}", self.kind, key, e);
                return Err(e);
            }
        };

        let meta = resource.metadata();
        if meta.is_deleting() {
            self.store.delete_by_name(&key.name).await?;
            info!("🗑️ {} {} 处于待删除窗口，已从 Store 删除", self.kind, key.name);
            return Ok(SyncOutcome::DeletedPending);
        }

        if let Some(marker) = &self.skip_marker {
            if marker.is_set(meta) {
                debug!("{} {} 带有跳过标记 {}，不同步", self.kind, key.name, marker.annotation());
                return Ok(SyncOutcome::Skipped);
            }
        }

        self.store.upsert_by_name(&resource).await?;
        debug!("{} {} 已写入 Store", self.kind, key.name);
        Ok(SyncOutcome::Upserted)
    }

    fn record(&self, result: &Result<SyncOutcome>) {
        let mut stats = self.stats.write();
        stats.syncs += 1;
        match result {
            Ok(SyncOutcome::Upserted) => stats.upserts += 1,
            Ok(SyncOutcome::Deleted) => stats.deletes += 1,
            Ok(SyncOutcome::DeletedPending) => stats.pending_deletes += 1,
            Ok(SyncOutcome::Skipped) => stats.skipped += 1,
            Err(_) => stats.errors += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::memory::{MemoryStore, StoreCall};
    use crate::resource::{Object, ObjectMeta};
    use crate::sync::DEFAULT_SKIP_ANNOTATION;
    use crate::testing::{ScriptedSource, TestObject};
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    type Adapter = SyncAdapter<TestObject, ScriptedSource, MemoryStore<TestObject>>;

    fn object(meta: ObjectMeta) -> TestObject {
        Object::new(meta, serde_json::json!({"steps": []}))
    }

    fn adapter(source: ScriptedSource) -> (Adapter, Arc<MemoryStore<TestObject>>) {
        let store = Arc::new(MemoryStore::new());
        let adapter = SyncAdapter::new(ResourceKind::TestWorkflow, Arc::new(source), store.clone());
        (adapter, store)
    }

    #[tokio::test]
    async fn scenario_d_missing_object_deletes_by_bare_name() {
        let (adapter, store) = adapter(ScriptedSource::new());

        let outcome = assert_ok!(adapter.sync(&ResourceKey::namespaced("testkube", "missing-name")).await);
        assert_eq!(outcome, SyncOutcome::Deleted);
        assert_eq!(store.calls(), vec![StoreCall::Delete("missing-name".to_string())]);
    }

    #[tokio::test]
    async fn pending_deletion_deletes_once_and_never_upserts() {
        let meta = ObjectMeta::new("wf", Utc::now())
            .with_deletion_timestamp(Utc::now())
            // 跳过标记不影响删除
            .with_annotation(DEFAULT_SKIP_ANNOTATION, "true");
        let (adapter, store) = adapter(ScriptedSource::new().with_object(object(meta)));

        let outcome = assert_ok!(adapter.sync(&ResourceKey::new("wf")).await);
        assert_eq!(outcome, SyncOutcome::DeletedPending);
        assert_eq!(store.calls(), vec![StoreCall::Delete("wf".to_string())]);
    }

    #[tokio::test]
    async fn skip_marker_true_makes_no_store_calls() {
        for value in ["true", "1", "T"] {
            let meta = ObjectMeta::new("wf", Utc::now()).with_annotation(DEFAULT_SKIP_ANNOTATION, value);
            let (adapter, store) = adapter(ScriptedSource::new().with_object(object(meta)));

            let outcome = assert_ok!(adapter.sync(&ResourceKey::new("wf")).await);
            assert_eq!(outcome, SyncOutcome::Skipped);
            assert!(store.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn skip_marker_absent_empty_or_unparseable_upserts() {
        let cases = [None, Some(""), Some("maybe"), Some("false")];
        for value in cases {
            let mut meta = ObjectMeta::new("wf", Utc::now());
            if let Some(v) = value {
                meta = meta.with_annotation(DEFAULT_SKIP_ANNOTATION, v);
            }
            let (adapter, store) = adapter(ScriptedSource::new().with_object(object(meta)));

            let outcome = assert_ok!(adapter.sync(&ResourceKey::new("wf")).await);
            assert_eq!(outcome, SyncOutcome::Upserted, "{:?}", value);
            assert_eq!(store.calls(), vec![StoreCall::Upsert("wf".to_string())]);
            assert!(store.get("wf").is_some());
        }
    }

    #[tokio::test]
    async fn skip_marker_disabled_for_kind_upserts() {
        let meta = ObjectMeta::new("wf", Utc::now()).with_annotation(DEFAULT_SKIP_ANNOTATION, "true");
        let (adapter, store) = adapter(ScriptedSource::new().with_object(object(meta)));
        let adapter = adapter.with_skip_marker(None);

        assert_eq!(assert_ok!(adapter.sync(&ResourceKey::new("wf")).await), SyncOutcome::Upserted);
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn from_config_respects_disabled_kinds() {
        let config = SyncConfig::builder()
            .disable_skip_marker_for(ResourceKind::TestWorkflow)
            .build()
            .unwrap();
        let meta = ObjectMeta::new("wf", Utc::now()).with_annotation(DEFAULT_SKIP_ANNOTATION, "true");
        let source = Arc::new(ScriptedSource::new().with_object(object(meta)));
        let store = Arc::new(MemoryStore::new());

        let workflows: Adapter = SyncAdapter::from_config(ResourceKind::TestWorkflow, source.clone(), store.clone(), &config);
        let triggers: Adapter = SyncAdapter::from_config(ResourceKind::TestTrigger, source, store, &config);

        assert_eq!(assert_ok!(workflows.sync(&ResourceKey::new("wf")).await), SyncOutcome::Upserted);
        assert_eq!(assert_ok!(triggers.sync(&ResourceKey::new("wf")).await), SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn fetch_error_is_returned_unchanged_without_store_calls() {
        let source = ScriptedSource::new().with_get_error("wf", SyncError::Source("connection reset".into()));
        let (adapter, store) = adapter(source);

        let err = assert_err!(adapter.sync(&ResourceKey::new("wf")).await);
        assert_eq!(err, SyncError::Source("connection reset".into()));
        assert!(store.calls().is_empty());
        assert_eq!(adapter.stats().errors, 1);
    }

    #[tokio::test]
    async fn store_errors_are_surfaced() {
        let meta = ObjectMeta::new("wf", Utc::now());
        let (adapter, store) = adapter(ScriptedSource::new().with_object(object(meta)));
        store.fail_next(SyncError::Store("unavailable".into()));

        let err = assert_err!(adapter.sync(&ResourceKey::new("wf")).await);
        assert_eq!(err, SyncError::Store("unavailable".into()));

        // 下一次成功（幂等 upsert）
        assert_ok!(adapter.sync(&ResourceKey::new("wf")).await);
        assert!(store.get("wf").is_some());
    }

    #[tokio::test]
    async fn fetch_uses_full_key_but_store_uses_name() {
        let meta = ObjectMeta::new("wf", Utc::now()).with_namespace("testkube");
        let source = Arc::new(ScriptedSource::new().with_object(object(meta)));
        let store = Arc::new(MemoryStore::new());
        let adapter: Adapter = SyncAdapter::new(ResourceKind::TestWorkflow, source.clone(), store.clone());

        let key = ResourceKey::namespaced("testkube", "wf");
        assert_ok!(adapter.sync(&key).await);
        assert_eq!(source.get_calls(), vec![key]);
        assert_eq!(store.calls(), vec![StoreCall::Upsert("wf".to_string())]);
    }

    #[tokio::test]
    async fn stats_track_outcomes() {
        let live = object(ObjectMeta::new("live", Utc::now()));
        let skipped = object(ObjectMeta::new("skipped", Utc::now()).with_annotation(DEFAULT_SKIP_ANNOTATION, "true"));
        let (adapter, _store) = adapter(ScriptedSource::new().with_object(live).with_object(skipped));

        assert_ok!(adapter.sync(&ResourceKey::new("live")).await);
        assert_ok!(adapter.sync(&ResourceKey::new("skipped")).await);
        assert_ok!(adapter.sync(&ResourceKey::new("gone")).await);

        let stats = adapter.stats();
        assert_eq!(stats.syncs, 3);
        assert_eq!(stats.upserts, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.success_rate(), 1.0);
    }
}
