//! 内存同步演示
//!
//! 用内存源端与内存 Store 演示完整的同步流程：快照、实时变更、跳过标记、待删除窗口。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use resource_sync::{
    MemorySource, MemoryStore, Object, ObjectMeta, ResourceKey, ResourceKind, SyncConfig,
    SyncController, DEFAULT_SKIP_ANNOTATION,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn workflow(name: &str, steps: &[&str]) -> Object {
    Object::new(
        ObjectMeta::new(name, Utc::now()).with_namespace("testkube"),
        serde_json::json!({ "steps": steps }),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n==============================================");
    println!("🔄 资源同步演示");
    println!("==============================================\n");

    let config = SyncConfig::builder()
        .namespace("testkube")
        .worker_count(2)
        .resubscribe_delay_ms(200)
        .build()?;

    // 后端不发送删除事件，只设置 deletion_timestamp
    let source = Arc::new(MemorySource::<Object>::new().without_delete_events());
    let store = Arc::new(MemoryStore::<Object>::new());

    source.apply(workflow("build", &["checkout", "compile"]));
    let mut manual = workflow("manual", &["echo"]);
    manual.metadata = manual.metadata.with_annotation(DEFAULT_SKIP_ANNOTATION, "true");
    source.apply(manual);

    let controller = Arc::new(SyncController::<Object, _, _>::new(
        ResourceKind::TestWorkflow,
        source.clone(),
        store.clone(),
        config,
    ));
    let cancel = CancellationToken::new();
    let handle = {
        let controller = controller.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { controller.run(cancel).await })
    };

    sleep(Duration::from_millis(200)).await;
    println!("📌 快照同步后: {:?}", store.names());

    source.apply(workflow("deploy", &["helm upgrade"]));
    source.apply(workflow("build", &["checkout", "compile", "test"]));
    sleep(Duration::from_millis(200)).await;
    println!("📌 实时变更后: {:?}", store.names());

    source.mark_deleting(&ResourceKey::namespaced("testkube", "build"), Utc::now())?;
    sleep(Duration::from_millis(200)).await;
    println!("📌 build 进入待删除窗口后: {:?}", store.names());

    cancel.cancel();
    handle.await??;

    println!("\n📊 同步统计: {:?}", controller.sync_stats());
    println!("📊 调度统计: {:?}", controller.stats());

    println!("\n==============================================");
    println!("✅ 演示完成");
    println!("==============================================\n");
    Ok(())
}
