//! SDK 版本与运行时元信息
//!
//! - **SDK Version** → Cargo.toml（唯一权威源）
//! - **Runtime Metadata** → 本模块（git sha / 构建时间由 vergen 注入）

/// SDK semver，来自 Cargo.toml
///
/// 禁止手写版本号，必须用 `env!("CARGO_PKG_VERSION")` 与 Cargo.toml 保持同步。
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK 包名，用于 User-Agent
pub const SDK_NAME: &str = env!("CARGO_PKG_NAME");

/// git commit（由 vergen 在 build.rs 中生成）
pub const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

/// build time（由 vergen 在 build.rs 中生成）
pub const BUILD_TIME: &str = env!("VERGEN_BUILD_TIMESTAMP");

/// 默认 User-Agent：`cowork-admin-sdk/0.1.0`
pub fn user_agent() -> String {
    format!("{}/{}", SDK_NAME, SDK_VERSION)
}
