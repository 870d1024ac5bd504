//! 源端客户端契约（get / list / watch）
//!
//! watch 的已知特性由 [`crate::sync::ResourceWatcher`] 处理：
//! - 可能发送不携带数据的 bookmark（心跳）事件
//! - 部分后端从不发送显式删除事件，只在对象上设置 deletion_timestamp

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::resource::{Resource, ResourceKey};

/// list / watch 的作用域
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    /// None 表示不限定命名空间
    pub namespace: Option<String>,
}

impl ListScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    /// 对象的命名空间是否落在作用域内
    pub fn contains(&self, namespace: Option<&str>) -> bool {
        match &self.namespace {
            None => true,
            Some(ns) => namespace == Some(ns.as_str()),
        }
    }
}

/// 一次 list 的结果：当前状态快照 + 用于接续 watch 的游标
#[derive(Debug, Clone)]
pub struct ResourceList<T> {
    pub items: Vec<T>,
    /// 列表的资源版本；从此处开始 watch 可避免空窗或重复
    pub resource_version: Option<String>,
}

impl<T> ResourceList<T> {
    pub fn new(items: Vec<T>, resource_version: Option<String>) -> Self {
        Self {
            items,
            resource_version,
        }
    }
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            resource_version: None,
        }
    }
}

/// 源端 watch 事件
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
    /// 心跳 / 进度事件，不携带数据变更
    Bookmark { resource_version: Option<String> },
    /// 无法解码的事件（例如状态对象）
    Error(String),
}

impl<T> WatchEvent<T> {
    pub fn kind_str(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Modified(_) => "modified",
            WatchEvent::Deleted(_) => "deleted",
            WatchEvent::Bookmark { .. } => "bookmark",
            WatchEvent::Error(_) => "error",
        }
    }
}

/// watch 事件流；流结束表示源端关闭了 watch
pub type WatchStream<T> = BoxStream<'static, WatchEvent<T>>;

/// 源端客户端
#[async_trait]
pub trait ResourceSource<T: Resource>: Send + Sync {
    /// 按键读取；对象不存在时返回 [`crate::SyncError::NotFound`]
    async fn get(&self, key: &ResourceKey) -> Result<T>;

    async fn list(&self, scope: &ListScope) -> Result<ResourceList<T>>;

    /// 从游标之后开始 watch；None 表示从当前时刻开始
    async fn watch(&self, scope: &ListScope, from_version: Option<&str>) -> Result<WatchStream<T>>;
}
