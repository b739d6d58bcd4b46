//! 事件系统模块 - 同步引擎与 UI 之间唯一的通道
//!
//! 功能包括：
//! - 通知列表变更事件
//! - 新通知提醒（toast）事件
//! - 同步状态变更事件
//! - 用户可见的操作失败事件
//! - 深链跳转请求、会话失效事件
//! - 事件广播、按类型监听与类型化观察者
//!
//! 引擎对渲染一无所知，只通过这里发出事件。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::notification::{Notification, NotificationType};
use crate::sync::{SyncOperation, SyncState};

/// SDK 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SDKEvent {
    /// 本地通知列表发生变化（完整快照）
    NotificationsChanged {
        notifications: Vec<Notification>,
        unread_count: usize,
        watermark: u64,
        timestamp: u64,
    },
    /// 新的未读通知到达，需要提醒用户
    NotificationAlert {
        notification: Notification,
        timestamp: u64,
    },
    /// 同步状态变更
    SyncStateChanged {
        old_state: SyncState,
        new_state: SyncState,
        timestamp: u64,
    },
    /// 需要展示给用户的操作失败
    OperationFailed {
        operation: SyncOperation,
        error: String,
        timestamp: u64,
    },
    /// 标记已读成功后，通知携带的深链需要跳转
    NavigationRequested {
        notification_id: u64,
        target_url: String,
        timestamp: u64,
    },
    /// 服务端返回 401，会话需要由宿主拆除
    SessionExpired {
        timestamp: u64,
    },
}

impl SDKEvent {
    /// 获取事件类型字符串
    pub fn event_type(&self) -> &'static str {
        match self {
            SDKEvent::NotificationsChanged { .. } => "notifications_changed",
            SDKEvent::NotificationAlert { .. } => "notification_alert",
            SDKEvent::SyncStateChanged { .. } => "sync_state_changed",
            SDKEvent::OperationFailed { .. } => "operation_failed",
            SDKEvent::NavigationRequested { .. } => "navigation_requested",
            SDKEvent::SessionExpired { .. } => "session_expired",
        }
    }

    /// 获取事件时间戳
    pub fn timestamp(&self) -> u64 {
        match self {
            SDKEvent::NotificationsChanged { timestamp, .. } => *timestamp,
            SDKEvent::NotificationAlert { timestamp, .. } => *timestamp,
            SDKEvent::SyncStateChanged { timestamp, .. } => *timestamp,
            SDKEvent::OperationFailed { timestamp, .. } => *timestamp,
            SDKEvent::NavigationRequested { timestamp, .. } => *timestamp,
            SDKEvent::SessionExpired { timestamp } => *timestamp,
        }
    }

    /// 获取提醒事件关联的通知类型
    pub fn notification_type(&self) -> Option<NotificationType> {
        match self {
            SDKEvent::NotificationAlert { notification, .. } => Some(notification.notification_type),
            _ => None,
        }
    }
}

/// 事件过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// 事件类型过滤器
    pub event_types: Option<Vec<String>>,
    /// 通知类型过滤器（仅对提醒事件生效）
    pub notification_types: Option<Vec<NotificationType>>,
}

impl EventFilter {
    /// 创建新的事件过滤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加事件类型过滤
    pub fn with_event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// 添加通知类型过滤
    pub fn with_notification_types(mut self, types: Vec<NotificationType>) -> Self {
        self.notification_types = Some(types);
        self
    }

    /// 检查事件是否匹配过滤器
    pub fn matches(&self, event: &SDKEvent) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        if let Some(ref notification_types) = self.notification_types {
            match event.notification_type() {
                Some(t) if notification_types.contains(&t) => {}
                _ => return false, // 事件没有通知类型但过滤器要求有
            }
        }

        true
    }
}

/// 类型化观察者
///
/// 所有方法都有空的默认实现，按需覆盖。回调在 emit 所在任务中同步执行，不要阻塞。
pub trait NotificationObserver: Send + Sync {
    fn on_notifications_changed(&self, _notifications: &[Notification], _unread_count: usize) {}

    fn on_alert(&self, _notification: &Notification) {}

    fn on_error(&self, _operation: SyncOperation, _message: &str) {}

    fn on_navigate(&self, _notification_id: u64, _target_url: &str) {}

    fn on_session_expired(&self) {}
}

/// 事件监听器类型
pub type EventListener = Box<dyn Fn(&SDKEvent) + Send + Sync>;

/// 事件管理器
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<SDKEvent>,
    /// 事件监听器映射
    listeners: Arc<tokio::sync::RwLock<HashMap<String, Vec<EventListener>>>>,
    /// 事件统计
    stats: Arc<tokio::sync::RwLock<EventStats>>,
}

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 监听器数量
    pub listener_count: usize,
    /// 最后事件时间
    pub last_event_time: Option<u64>,
}

impl EventManager {
    /// 创建新的事件管理器
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            listeners: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            stats: Arc::new(tokio::sync::RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    pub async fn emit(&self, event: SDKEvent) {
        debug!("Emitting event: {}", event.event_type());

        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            *stats.events_by_type.entry(event.event_type().to_string()).or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 无订阅者时 send 会失败，属正常场景（无 UI 的后台进程），仅打 debug
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        let listeners = self.listeners.read().await;
        if let Some(event_listeners) = listeners.get(event.event_type()) {
            for listener in event_listeners {
                listener(&event);
            }
        }

        if let Some(general_listeners) = listeners.get("*") {
            for listener in general_listeners {
                listener(&event);
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SDKEvent> {
        self.sender.subscribe()
    }

    /// 订阅特定类型的事件
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        FilteredEventReceiver::new(self.sender.subscribe(), filter)
    }

    /// 添加事件监听器，`"*"` 监听全部事件
    pub async fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&SDKEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().await;
        listeners.entry(event_type.to_string()).or_default().push(Box::new(listener));

        let mut stats = self.stats.write().await;
        stats.listener_count = listeners.values().map(|v| v.len()).sum();

        info!("Added listener for event type: {}", event_type);
    }

    /// 注册类型化观察者
    pub async fn add_observer(&self, observer: Arc<dyn NotificationObserver>) {
        self.add_listener("*", move |event| dispatch_to_observer(observer.as_ref(), event))
            .await;
    }

    /// 移除所有监听器
    pub async fn clear_listeners(&self) {
        let mut listeners = self.listeners.write().await;
        listeners.clear();

        let mut stats = self.stats.write().await;
        stats.listener_count = 0;

        info!("Cleared all event listeners");
    }

    /// 获取事件统计
    pub async fn get_stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }

    /// 获取活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// 测试用：持有统计写锁，之后的 emit 都会排队等待
    #[cfg(test)]
    pub(crate) async fn hold_emits(&self) -> tokio::sync::RwLockWriteGuard<'_, EventStats> {
        self.stats.write().await
    }
}

fn dispatch_to_observer(observer: &dyn NotificationObserver, event: &SDKEvent) {
    match event {
        SDKEvent::NotificationsChanged {
            notifications,
            unread_count,
            ..
        } => observer.on_notifications_changed(notifications, *unread_count),
        SDKEvent::NotificationAlert { notification, .. } => observer.on_alert(notification),
        SDKEvent::OperationFailed { operation, error, .. } => observer.on_error(*operation, error),
        SDKEvent::NavigationRequested {
            notification_id,
            target_url,
            ..
        } => observer.on_navigate(*notification_id, target_url),
        SDKEvent::SessionExpired { .. } => observer.on_session_expired(),
        SDKEvent::SyncStateChanged { .. } => {}
    }
}

/// 过滤事件接收器
pub struct FilteredEventReceiver {
    receiver: broadcast::Receiver<SDKEvent>,
    filter: EventFilter,
}

impl FilteredEventReceiver {
    /// 创建新的过滤事件接收器
    pub fn new(receiver: broadcast::Receiver<SDKEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// 接收下一个匹配的事件
    pub async fn recv(&mut self) -> Result<SDKEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// 尝试接收事件（非阻塞）
    pub fn try_recv(&mut self) -> Result<SDKEvent, broadcast::error::TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

/// 当前 unix 秒
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 事件生成器 - 辅助函数
pub mod event_builders {
    use super::*;

    /// 创建列表变更事件
    pub fn notifications_changed(notifications: Vec<Notification>, watermark: u64) -> SDKEvent {
        let unread_count = notifications.iter().filter(|n| !n.is_read).count();
        SDKEvent::NotificationsChanged {
            notifications,
            unread_count,
            watermark,
            timestamp: now_secs(),
        }
    }

    /// 创建提醒事件
    pub fn notification_alert(notification: Notification) -> SDKEvent {
        SDKEvent::NotificationAlert {
            notification,
            timestamp: now_secs(),
        }
    }

    /// 创建同步状态变更事件
    pub fn sync_state_changed(old_state: SyncState, new_state: SyncState) -> SDKEvent {
        SDKEvent::SyncStateChanged {
            old_state,
            new_state,
            timestamp: now_secs(),
        }
    }

    /// 创建操作失败事件
    pub fn operation_failed(operation: SyncOperation, error: impl Into<String>) -> SDKEvent {
        SDKEvent::OperationFailed {
            operation,
            error: error.into(),
            timestamp: now_secs(),
        }
    }

    /// 创建深链跳转事件
    pub fn navigation_requested(notification_id: u64, target_url: impl Into<String>) -> SDKEvent {
        SDKEvent::NavigationRequested {
            notification_id,
            target_url: target_url.into(),
            timestamp: now_secs(),
        }
    }

    /// 创建会话失效事件
    pub fn session_expired() -> SDKEvent {
        SDKEvent::SessionExpired {
            timestamp: now_secs(),
        }
    }
}
