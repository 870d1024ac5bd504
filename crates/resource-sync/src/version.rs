//! 版本与构建元信息
//!
//! - **Crate Version** → Cargo.toml（唯一权威源）
//! - **Build Metadata** → build.rs（vergen）

/// 同步引擎 semver，来自 Cargo.toml
///
/// 禁止手写版本号，必须用 `env!("CARGO_PKG_VERSION")` 与 Cargo.toml 保持同步。
pub const SYNC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// build time（由 vergen 在 build.rs 中生成；生成失败时为 "unknown"）
pub const BUILD_TIME: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// 启动日志中使用的版本描述
pub fn version_line() -> String {
    format!("resource-sync {} (built {})", SYNC_VERSION, BUILD_TIME)
}
