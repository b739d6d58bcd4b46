//! 轮询失败退避
//!
//! 连续失败时按指数放大轮询间隔并叠加随机抖动，避免大量控制台同时对服务端重试；
//! 一次成功即恢复到正常间隔。

use std::time::Duration;
use tracing::{debug, info};

use crate::sdk::PollingConfig;

/// 单次等待的上限（一天），超出的配置值按上限处理
pub(crate) const MAX_DELAY_SECS: u64 = 86_400;

/// 轮询退避状态
///
/// 只在轮询任务内部使用，不需要加锁。
#[derive(Debug, Clone)]
pub struct PollBackoff {
    config: PollingConfig,
    /// 连续失败次数
    consecutive_failures: u32,
}

impl PollBackoff {
    pub fn new(config: PollingConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    /// 下一次等待时长
    ///
    /// 无失败或未启用退避时为正常间隔；否则
    /// `interval * multiplier^failures`，封顶 `max_backoff_secs`，再叠加 ±jitter。
    /// 结果不超过 `MAX_DELAY_SECS`。
    pub fn next_delay(&self) -> Duration {
        let base = self.config.interval_secs.min(MAX_DELAY_SECS) as f64;
        if !self.config.backoff_enabled || self.consecutive_failures == 0 {
            return Duration::from_secs_f64(base);
        }

        let exp = base * self.config.backoff_multiplier.powi(self.consecutive_failures as i32);
        let cap = self.config.max_backoff_secs.min(MAX_DELAY_SECS) as f64;
        let capped = exp.min(cap).max(base);

        let jitter = capped * self.config.jitter_factor * (rand::random::<f64>() * 2.0 - 1.0);
        let delay = (capped + jitter).max(base).min(MAX_DELAY_SECS as f64);

        debug!(
            "轮询退避: 连续失败 {} 次, 下次间隔 {:.1}s",
            self.consecutive_failures, delay
        );
        Duration::from_secs_f64(delay)
    }

    /// 记录一次失败
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// 记录一次成功，重置退避
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                "轮询恢复，重置退避（之前连续失败 {} 次）",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
