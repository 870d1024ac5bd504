//! 变更分类：根据元数据推算对象的有效最后变更时间
//!
//! list 只返回当前状态而没有历史，无法区分「刚创建」与「早先创建、之后被修改」，
//! 因此用创建时间、写入记录与删除时间近似判断。

use chrono::{DateTime, Utc};

use super::UpdateType;
use crate::resource::ObjectMeta;

/// 有效最后变更时间
///
/// - 设置了 deletion_timestamp：直接返回它，即使某条写入记录更晚（删除是最终事件）
/// - 否则取创建时间与所有写入时间中的最大值；没有写入记录时等于创建时间
pub fn effective_update_time(meta: &ObjectMeta) -> DateTime<Utc> {
    if let Some(deleted_at) = meta.deletion_timestamp {
        return deleted_at;
    }
    meta.managed_fields
        .iter()
        .filter_map(|entry| entry.timestamp)
        .fold(meta.creation_timestamp, |latest, at| latest.max(at))
}

/// 快照中对象的变更类型：有效时间等于创建时间视为新建，否则视为修改
pub fn classify_snapshot(meta: &ObjectMeta) -> UpdateType {
    if effective_update_time(meta) == meta.creation_timestamp {
        UpdateType::Create
    } else {
        UpdateType::Update
    }
}
