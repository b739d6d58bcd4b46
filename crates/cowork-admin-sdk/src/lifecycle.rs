//! SDK 生命周期管理
//!
//! 管理管理台前后台切换等生命周期事件，统一触发各模块的状态切换。

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// 生命周期回调 Hook
///
/// 各模块通过实现此 trait 来响应生命周期变化
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// 切换到后台时调用
    async fn on_background(&self) -> Result<()>;

    /// 切换到前台时调用
    async fn on_foreground(&self) -> Result<()>;
}

/// 生命周期管理器
pub struct LifecycleManager {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// 注册生命周期回调 Hook
    pub fn register_hook(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
        info!("✅ 生命周期 Hook 已注册: 当前共 {} 个", self.hooks.len());
    }

    /// 通知所有 Hook：切换到后台
    ///
    /// 按注册顺序执行，某个 Hook 失败时记录错误并继续，最后返回第一个错误
    pub async fn notify_background(&self) -> Result<()> {
        info!("🔄 通知所有模块：切换到后台");

        let mut first_error = None;
        let mut failed = 0;
        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(e) = hook.on_background().await {
                warn!("⚠️ Hook #{} 后台切换失败: {}", index, e);
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                warn!("⚠️ {} 个模块后台切换失败，其余模块均已执行", failed);
                Err(e)
            }
            None => {
                info!("✅ 所有模块后台切换完成");
                Ok(())
            }
        }
    }

    /// 通知所有 Hook：切换到前台
    pub async fn notify_foreground(&self) -> Result<()> {
        info!("🔄 通知所有模块：切换到前台");

        let mut first_error = None;
        let mut failed = 0;
        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(e) = hook.on_foreground().await {
                warn!("⚠️ Hook #{} 前台切换失败: {}", index, e);
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                warn!("⚠️ {} 个模块前台切换失败，其余模块均已执行", failed);
                Err(e)
            }
            None => {
                info!("✅ 所有模块前台切换完成");
                Ok(())
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

// 轮询 Hook（SDK 内部自动注册）
mod polling_hook;
pub use polling_hook::PollingLifecycleHook;
