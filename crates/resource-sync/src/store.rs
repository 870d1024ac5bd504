//! Store（外部记录系统）契约
//!
//! 按类型各一对方法；Store 侧只按 name 寻址，不区分命名空间。

use async_trait::async_trait;

use crate::error::Result;

/// 目标存储
///
/// 两个方法都必须幂等：同一对象无论逻辑上是新建还是修改，都会收到相同的 upsert 调用；
/// 删除不存在的对象也应成功。不同键上的调用可能并发到达。
#[async_trait]
pub trait ResourceStore<T>: Send + Sync {
    async fn upsert_by_name(&self, resource: &T) -> Result<()>;

    async fn delete_by_name(&self, name: &str) -> Result<()>;
}
