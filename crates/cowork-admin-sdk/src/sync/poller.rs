//! 轮询定时器
//!
//! 单个 tokio 任务按固定间隔驱动同步引擎，连续失败时退避。
//! 循环是顺序的，上一次轮询结束前不会开始下一次。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CoworkSDKError, Result};
use crate::sdk::PollingConfig;
use crate::sync::backoff::PollBackoff;
use crate::sync::sync_engine::{NotificationSyncEngine, PollOutcome};

struct PollerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 通知轮询器
pub struct NotificationPoller {
    engine: Arc<NotificationSyncEngine>,
    config: PollingConfig,
    task: parking_lot::Mutex<Option<PollerTask>>,
    paused: Arc<AtomicBool>,
}

impl NotificationPoller {
    pub fn new(engine: Arc<NotificationSyncEngine>, config: PollingConfig) -> Self {
        Self {
            engine,
            config,
            task: parking_lot::Mutex::new(None),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 启动轮询任务，已在运行时返回 false
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("轮询任务已在运行");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::run(
            self.engine.clone(),
            PollBackoff::new(self.config.clone()),
            self.paused.clone(),
            cancel.clone(),
        ));
        *task = Some(PollerTask { cancel, handle });

        info!("▶️ 通知轮询已启动，间隔 {}s", self.config.interval_secs);
        true
    }

    /// 停止轮询
    ///
    /// 只取消等待中的定时器；进行中的请求会跑完，其结果由引擎按会话代次决定是否丢弃。
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel.cancel();
            info!("⏹️ 通知轮询已停止");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// 暂停（后台），定时器继续走但跳过轮询
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("⏸️ 通知轮询已暂停");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("▶️ 通知轮询已恢复");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// 立即轮询一次，不影响定时器
    pub async fn poll_now(&self) -> Result<PollOutcome> {
        debug!("立即轮询");
        self.engine.poll().await
    }

    async fn run(
        engine: Arc<NotificationSyncEngine>,
        mut backoff: PollBackoff,
        paused: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) {
        loop {
            let delay = backoff.next_delay();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if paused.load(Ordering::SeqCst) {
                debug!("轮询已暂停，跳过本次");
                continue;
            }

            Self::tick(&engine, &mut backoff).await;
        }
        debug!("轮询任务退出");
    }

    async fn tick(engine: &NotificationSyncEngine, backoff: &mut PollBackoff) {
        if !engine.is_initialized().await {
            // 首次全量加载失败，由定时器重试
            match engine.initialize().await {
                Ok(_) => backoff.record_success(),
                Err(CoworkSDKError::SessionClosed(_)) => {}
                Err(e) => {
                    warn!("⚠️ 重试全量加载失败: {}", e);
                    backoff.record_failure();
                }
            }
            return;
        }

        match engine.poll().await {
            Ok(_) => backoff.record_success(),
            // 与登出竞争
            Err(CoworkSDKError::NotInitialized(_)) => {}
            Err(_) => backoff.record_failure(),
        }
    }
}

impl Drop for NotificationPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}
