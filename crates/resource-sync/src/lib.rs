//! Resource Sync - 资源定义单向同步引擎
//!
//! 让外部记录系统（Store）与可 watch、带资源版本的源端保持最终一致：
//! - 🔄 变更监听：list 快照 + 实时 watch，归一化为 Create / Update / Delete
//! - 🧭 删除推断：deletion_timestamp 非空即视为删除，不依赖源端删除事件
//! - 🚫 跳过标记：注解值为 true 的对象不复制到 Store
//! - 📦 单消费者变更流：零容量交接，终止错误对所有读取方可见
//! - ⚙️ 调度器：同键串行、不同键并发，失败指数退避重试，流关闭后自动重新订阅
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use resource_sync::{
//!     MemorySource, MemoryStore, Object, ResourceKind, SyncConfig, SyncController,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::builder()
//!         .namespace("testkube")
//!         .worker_count(4)
//!         .build()?;
//!
//!     let source = Arc::new(MemorySource::<Object>::new());
//!     let store = Arc::new(MemoryStore::<Object>::new());
//!     let controller = SyncController::<Object, _, _>::new(ResourceKind::TestWorkflow, source, store, config);
//!
//!     // 运行直到取消
//!     let cancel = CancellationToken::new();
//!     controller.run(cancel).await?;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod config;
pub mod controller;
pub mod error;
pub mod memory;
pub mod resource;
pub mod source;
pub mod store;
pub mod stream;
pub mod sync;
pub mod version;

#[cfg(test)]
mod testing;

// 重新导出核心类型，方便使用
pub use config::{ControllerConfig, SkipMarkerConfig, SyncConfig, SyncConfigBuilder, WatchConfig};
pub use controller::{ControllerStats, RetryPolicy, SyncController, WorkQueue};
pub use error::{Result, SyncError};
pub use memory::{MemorySource, MemoryStore, StoreCall};
pub use resource::{ManagedWriteEntry, Object, ObjectMeta, Resource, ResourceKey, ResourceKind};
pub use source::{ListScope, ResourceList, ResourceSource, WatchEvent, WatchStream};
pub use store::ResourceStore;
pub use stream::{change_stream, ChangeSender, ChangeStream};
pub use sync::{
    ResourceWatcher, SkipMarker, SyncAdapter, SyncOutcome, SyncStats, Update, UpdateType,
    DEFAULT_SKIP_ANNOTATION,
};
pub use version::{BUILD_TIME, SYNC_VERSION};
