//! 轮询生命周期 Hook
//!
//! 后台时暂停轮询，回到前台时恢复并立即轮询一次。

use crate::error::{CoworkSDKError, Result};
use crate::lifecycle::LifecycleHook;
use crate::sync::NotificationPoller;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PollingLifecycleHook {
    poller: Arc<NotificationPoller>,
    pause_in_background: bool,
}

impl PollingLifecycleHook {
    pub fn new(poller: Arc<NotificationPoller>, pause_in_background: bool) -> Self {
        Self {
            poller,
            pause_in_background,
        }
    }
}

#[async_trait]
impl LifecycleHook for PollingLifecycleHook {
    async fn on_background(&self) -> Result<()> {
        if !self.pause_in_background {
            debug!("[Polling Hook] 后台继续轮询");
            return Ok(());
        }
        info!("[Polling Hook] 切换到后台，暂停通知轮询");
        self.poller.pause();
        Ok(())
    }

    /// 恢复轮询并立即补拉一次；轮询失败只记日志
    async fn on_foreground(&self) -> Result<()> {
        if !self.pause_in_background {
            return Ok(());
        }
        info!("[Polling Hook] 回到前台，恢复通知轮询");
        self.poller.resume();

        if !self.poller.is_running() {
            return Ok(());
        }
        match self.poller.poll_now().await {
            Ok(_) => {}
            Err(CoworkSDKError::NotInitialized(_)) => {
                debug!("[Polling Hook] 尚未完成全量加载，交给定时器重试");
            }
            Err(e) => warn!("[Polling Hook] ⚠️ 前台补拉失败: {}", e),
        }
        Ok(())
    }
}
