//! 对象元数据与资源抽象
//!
//! 资源的 spec 对同步引擎是不透明的，引擎只读取元数据：名称、创建 / 删除时间、写入记录、注解。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单个写入方的最后写入记录（用于近似最后修改时间）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedWriteEntry {
    /// 写入方标识
    pub field_manager: String,
    /// 写入时间；部分源端不提供
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ManagedWriteEntry {
    pub fn new(field_manager: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            field_manager: field_manager.into(),
            timestamp: Some(timestamp),
        }
    }
}

/// 对象元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// 源端资源版本（不透明字符串，仅用于 watch 游标）
    #[serde(default)]
    pub resource_version: Option<String>,
    pub creation_timestamp: DateTime<Utc>,
    /// 非空表示对象处于待删除窗口，删除不可逆
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub managed_fields: Vec<ManagedWriteEntry>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, creation_timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            resource_version: None,
            creation_timestamp,
            deletion_timestamp: None,
            managed_fields: Vec::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_managed_write(mut self, field_manager: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.managed_fields.push(ManagedWriteEntry::new(field_manager, at));
        self
    }

    pub fn with_deletion_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(at);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// 是否已进入待删除窗口
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// 资源键：源端按 (namespace?, name) 定位，Store 侧只使用 name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// 可被同步的资源
///
/// 只要求暴露元数据；`Clone` 用于把快照交给事件，避免与源端缓存共享。
pub trait Resource: Clone + Send + Sync + 'static {
    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}

/// 通用资源：元数据 + 不透明 spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object<S = serde_json::Value> {
    pub metadata: ObjectMeta,
    pub spec: S,
}

impl<S> Object<S> {
    pub fn new(metadata: ObjectMeta, spec: S) -> Self {
        Self { metadata, spec }
    }
}

impl<S> Resource for Object<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
