//! 资源同步模块
//!
//! 两个方向：
//! - **Watcher**：把源端的 list 快照与 watch 事件归一化为单条有序的 Create / Update / Delete 流
//! - **Adapter**：按键读取源端最新状态，写入（或删除）外部 Store
//!
//! ## NOTE: 两者均不做重试
//!
//! 重试、退避、重新订阅、同键串行都由调度层负责（见 [`crate::controller`]）。

mod adapter;
pub mod classifier;
mod skip_marker;
mod update;
mod watcher;

pub use adapter::{SyncAdapter, SyncOutcome, SyncStats};
pub use classifier::{classify_snapshot, effective_update_time};
pub use skip_marker::{parse_bool, SkipMarker, DEFAULT_SKIP_ANNOTATION};
pub use update::{Update, UpdateType};
pub use watcher::ResourceWatcher;
