use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceKey};

/// 归一化后的变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateType {
    Create,
    Update,
    Delete,
}

impl UpdateType {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Create => "create",
            UpdateType::Update => "update",
            UpdateType::Delete => "delete",
        }
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条归一化变更
///
/// `resource` 是事件独占的快照；`timestamp` 为对象的有效最后变更时间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update<T> {
    pub update_type: UpdateType,
    pub timestamp: DateTime<Utc>,
    pub resource: T,
}

impl<T: Resource> Update<T> {
    pub fn new(update_type: UpdateType, resource: T) -> Self {
        let timestamp = super::classifier::effective_update_time(resource.metadata());
        Self {
            update_type,
            timestamp,
            resource,
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.resource.metadata().key()
    }
}
