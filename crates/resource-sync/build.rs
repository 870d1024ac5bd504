//! 编译期生成 BUILD_TIMESTAMP 元信息（供 version.rs 使用）

use vergen::EmitBuilder;

fn main() {
    // vergen 失败时输出占位值，不阻断编译
    let _ = EmitBuilder::builder().build_timestamp().emit();
}
