//! 通知同步模块
//!
//! 职责：
//! - 维护本地通知缓存与水位线（notification_cache）
//! - 全量加载、增量轮询、已读回写（sync_engine）
//! - 轮询定时器与失败退避（poller / backoff）

pub mod backoff;
pub mod notification_cache;
pub mod poller;
pub mod sync_engine;

pub use backoff::PollBackoff;
pub use notification_cache::{DeltaOutcome, NotificationCache};
pub use poller::NotificationPoller;
pub use sync_engine::{MarkReadOutcome, NotificationSyncEngine, PollOutcome, PollReport};

/// 同步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SyncState {
    /// 未初始化（尚未全量加载，或已登出）
    Uninitialized,
    /// 已同步
    Synced,
    /// 正在轮询
    Polling,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Uninitialized => write!(f, "未初始化"),
            SyncState::Synced => write!(f, "已同步"),
            SyncState::Polling => write!(f, "轮询中"),
        }
    }
}

/// 同步引擎对外的操作，用于错误上报
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SyncOperation {
    Initialize,
    Poll,
    MarkRead,
    MarkAllRead,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Initialize => "initialize",
            SyncOperation::Poll => "poll",
            SyncOperation::MarkRead => "mark_read",
            SyncOperation::MarkAllRead => "mark_all_read",
        }
    }
}
