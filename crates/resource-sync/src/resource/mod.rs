//! 资源模型：类型枚举、元数据、资源键

mod kind;
mod meta;

pub use kind::ResourceKind;
pub use meta::{ManagedWriteEntry, Object, ObjectMeta, Resource, ResourceKey};
