//! 通知同步引擎
//!
//! 职责：
//! - 全量加载（initialize），整体替换本地缓存
//! - 按水位线增量轮询（poll），去重合并并发出提醒
//! - 单条 / 全部标记已读，服务端确认后才修改本地状态
//! - 登出时清空缓存，丢弃迟到的响应
//!
//! 并发约束：
//! - `poll_lock` 串行化 initialize 与 poll，两次轮询不会读到同一个旧水位线
//! - 缓存与水位线在同一把锁内一起更新
//! - 网络请求期间不持有缓存锁
//! - 事件在缓存锁内发出，观察者看到的快照顺序与修改顺序一致

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::NotificationApi;
use crate::error::{CoworkSDKError, Result};
use crate::events::{event_builders, EventManager};
use crate::notification::Notification;
use crate::sdk::SyncConfig;
use crate::sync::notification_cache::NotificationCache;
use crate::sync::{SyncOperation, SyncState};

/// 一次成功轮询的统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// 服务端返回条数
    pub fetched: usize,
    /// 插入到本地列表的条数
    pub inserted: usize,
    /// 发出的提醒条数
    pub alerts: usize,
    /// 已见过而被丢弃的条数
    pub skipped: usize,
    /// 轮询后的水位线
    pub watermark: u64,
    /// 完成时间（UTC 毫秒）
    pub synced_at: i64,
}

/// 轮询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 响应已合并
    Applied(PollReport),
    /// 会话在请求期间结束，响应被丢弃
    Discarded,
}

/// 标记已读结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkReadOutcome {
    pub id: u64,
    /// 本地缓存中是否存在该通知
    pub found: bool,
    /// 通知携带的深链，调用方应跳转
    pub navigate_to: Option<String>,
}

struct EngineInner {
    cache: NotificationCache,
    state: SyncState,
}

impl EngineInner {
    /// 切换状态，返回 (旧, 新)；状态未变返回 None
    fn set_state(&mut self, new_state: SyncState) -> Option<(SyncState, SyncState)> {
        if self.state == new_state {
            return None;
        }
        let old_state = std::mem::replace(&mut self.state, new_state);
        Some((old_state, new_state))
    }
}

/// 通知同步引擎
pub struct NotificationSyncEngine {
    /// Notification Service 客户端
    api: Arc<dyn NotificationApi>,

    /// 事件管理器
    event_manager: Arc<EventManager>,

    config: SyncConfig,

    /// 缓存 + 状态
    inner: Mutex<EngineInner>,

    /// initialize / poll 互斥
    poll_lock: Mutex<()>,

    /// 会话代次，登出时 +1，用于丢弃迟到的响应
    session_epoch: AtomicU64,
}

impl NotificationSyncEngine {
    /// 创建同步引擎
    pub fn new(
        api: Arc<dyn NotificationApi>,
        event_manager: Arc<EventManager>,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            event_manager,
            config,
            inner: Mutex::new(EngineInner {
                cache: NotificationCache::new(),
                state: SyncState::Uninitialized,
            }),
            poll_lock: Mutex::new(()),
            session_epoch: AtomicU64::new(0),
        }
    }

    /// 全量加载
    ///
    /// 整体替换本地缓存，因此重复调用与调用一次等价。
    /// 失败时缓存保持原样，错误会作为用户可见事件发出。
    pub async fn initialize(&self) -> Result<usize> {
        let _guard = self.poll_lock.lock().await;
        let epoch = self.session_epoch.load(Ordering::SeqCst);

        info!("🔄 开始全量加载通知...");
        let list = match self.api.list_all().await {
            Ok(list) => list,
            Err(e) => {
                error!("❌ 全量加载通知失败: {}", e);
                self.report_failure(SyncOperation::Initialize, &e, true).await;
                return Err(e);
            }
        };

        let mut inner = self.inner.lock().await;
        if self.session_epoch.load(Ordering::SeqCst) != epoch {
            warn!("会话已结束，丢弃全量加载结果");
            return Err(CoworkSDKError::SessionClosed(
                "全量加载期间会话已结束".to_string(),
            ));
        }
        inner.cache.replace_all(list);
        let transition = inner.set_state(SyncState::Synced);

        let count = inner.cache.len();
        info!(
            "✅ 通知全量加载完成: {} 条, watermark={}",
            count,
            inner.cache.watermark()
        );

        self.emit_transition(transition).await;
        self.emit_snapshot(&inner.cache).await;

        Ok(count)
    }

    /// 增量轮询
    ///
    /// 以当前水位线为 since_id 拉取新通知。失败时状态不变、水位线不前进，
    /// 只记日志，由下一个周期用同一个水位线重试。
    pub async fn poll(&self) -> Result<PollOutcome> {
        let _guard = self.poll_lock.lock().await;

        let (since_id, epoch) = {
            let mut inner = self.inner.lock().await;
            if inner.state == SyncState::Uninitialized {
                return Err(CoworkSDKError::NotInitialized(
                    "通知尚未完成全量加载".to_string(),
                ));
            }
            let transition = inner.set_state(SyncState::Polling);
            self.emit_transition(transition).await;
            (
                inner.cache.watermark(),
                self.session_epoch.load(Ordering::SeqCst),
            )
        };

        debug!("轮询新通知: since_id={}", since_id);
        let result = self.api.check_new(since_id).await;

        // 事件在锁内发出，登出后的快照不会被迟到的轮询覆盖
        let mut inner = self.inner.lock().await;
        if self.session_epoch.load(Ordering::SeqCst) != epoch {
            debug!("会话已结束，丢弃迟到的轮询响应: since_id={}", since_id);
            return Ok(PollOutcome::Discarded);
        }
        let transition = inner.set_state(SyncState::Synced);

        let items = match result {
            Ok(items) => items,
            Err(e) => {
                warn!("⚠️ 轮询失败，watermark 保持 {}，等待下次重试: {}", since_id, e);
                self.emit_transition(transition).await;
                self.report_failure(SyncOperation::Poll, &e, false).await;
                return Err(e);
            }
        };

        let fetched = items.len();
        let delta = inner.cache.apply_delta(items, self.config.merge_read_items);

        if fetched > 0 {
            info!(
                "📥 轮询到 {} 条通知: 新增 {}, 提醒 {}, 跳过 {}, watermark {} → {}",
                fetched,
                delta.inserted.len(),
                delta.alerts.len(),
                delta.skipped,
                delta.watermark_before,
                delta.watermark_after
            );
        }

        self.emit_transition(transition).await;
        for alert in delta.alerts.iter().cloned() {
            self.event_manager
                .emit(event_builders::notification_alert(alert))
                .await;
        }
        if delta.changed() {
            self.emit_snapshot(&inner.cache).await;
        }

        Ok(PollOutcome::Applied(PollReport {
            fetched,
            inserted: delta.inserted.len(),
            alerts: delta.alerts.len(),
            skipped: delta.skipped,
            watermark: delta.watermark_after,
            synced_at: chrono::Utc::now().timestamp_millis(),
        }))
    }

    /// 标记单条已读
    ///
    /// 先请求服务端，成功后才修改本地状态；本地不存在该 id 时只回写服务端。
    pub async fn mark_read(&self, id: u64) -> Result<MarkReadOutcome> {
        if let Err(e) = self.api.mark_read(id).await {
            error!("❌ 标记已读失败: id={}, error={}", id, e);
            self.report_failure(SyncOperation::MarkRead, &e, true).await;
            return Err(e);
        }

        let mut inner = self.inner.lock().await;
        let changed = inner.cache.mark_read(id);
        let navigate_to = inner
            .cache
            .get(id)
            .filter(|n| n.has_target())
            .and_then(|n| n.target_url.clone());

        if changed.is_none() {
            debug!("本地缓存中没有通知 id={}，仅回写服务端", id);
        }
        if changed == Some(true) {
            self.emit_snapshot(&inner.cache).await;
        }
        if let Some(ref target_url) = navigate_to {
            self.event_manager
                .emit(event_builders::navigation_requested(id, target_url.clone()))
                .await;
        }

        Ok(MarkReadOutcome {
            id,
            found: changed.is_some(),
            navigate_to,
        })
    }

    /// 全部标记已读，返回本地实际改动的条数
    pub async fn mark_all_read(&self) -> Result<usize> {
        if let Err(e) = self.api.mark_all_read().await {
            error!("❌ 全部标记已读失败: {}", e);
            self.report_failure(SyncOperation::MarkAllRead, &e, true).await;
            return Err(e);
        }

        let mut inner = self.inner.lock().await;
        let changed = inner.cache.mark_all_read();

        info!("✅ 全部标记已读: 本地更新 {} 条", changed);
        if changed > 0 {
            self.emit_snapshot(&inner.cache).await;
        }
        Ok(changed)
    }

    /// 清空缓存并回到未初始化（登出）
    ///
    /// 不等待进行中的请求，它们的响应会因为会话代次变化被丢弃。
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        self.session_epoch.fetch_add(1, Ordering::SeqCst);
        inner.cache.clear();
        let transition = inner.set_state(SyncState::Uninitialized);

        info!("通知缓存已清空（会话结束）");
        if transition.is_some() {
            self.emit_transition(transition).await;
            self.emit_snapshot(&inner.cache).await;
        }
    }

    /// 本地通知快照（新到旧）
    pub async fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().await.cache.notifications().to_vec()
    }

    pub async fn unread_count(&self) -> usize {
        self.inner.lock().await.cache.unread_count()
    }

    pub async fn watermark(&self) -> u64 {
        self.inner.lock().await.cache.watermark()
    }

    pub async fn state(&self) -> SyncState {
        self.inner.lock().await.state
    }

    pub async fn is_initialized(&self) -> bool {
        self.state().await != SyncState::Uninitialized
    }

    /// 发出列表快照，调用方必须持有 `inner` 锁
    async fn emit_snapshot(&self, cache: &NotificationCache) {
        self.event_manager
            .emit(event_builders::notifications_changed(
                cache.notifications().to_vec(),
                cache.watermark(),
            ))
            .await;
    }

    async fn emit_transition(&self, transition: Option<(SyncState, SyncState)>) {
        if let Some((old_state, new_state)) = transition {
            debug!("同步状态: {} → {}", old_state, new_state);
            self.event_manager
                .emit(event_builders::sync_state_changed(old_state, new_state))
                .await;
        }
    }

    /// 上报失败：401 额外发出会话失效事件；user_visible 时发出操作失败事件
    async fn report_failure(
        &self,
        operation: SyncOperation,
        error: &CoworkSDKError,
        user_visible: bool,
    ) {
        if error.is_unauthorized() {
            warn!("{} 返回 401，会话已失效", operation.as_str());
            self.event_manager
                .emit(event_builders::session_expired())
                .await;
        }
        if user_visible {
            self.event_manager
                .emit(event_builders::operation_failed(operation, error.to_string()))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{notification, notification_with_target, FakeNotificationApi};
    use crate::events::SDKEvent;
    use tokio::sync::broadcast;
    use tokio_test::{assert_err, assert_ok};

    fn engine_with(api: Arc<FakeNotificationApi>, config: SyncConfig) -> (Arc<NotificationSyncEngine>, broadcast::Receiver<SDKEvent>) {
        let events = Arc::new(EventManager::new(1000));
        let rx = events.subscribe();
        (Arc::new(NotificationSyncEngine::new(api, events, config)), rx)
    }

    fn engine(api: Arc<FakeNotificationApi>) -> (Arc<NotificationSyncEngine>, broadcast::Receiver<SDKEvent>) {
        engine_with(api, SyncConfig::default())
    }

    fn drain(rx: &mut broadcast::Receiver<SDKEvent>) -> Vec<SDKEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn alert_ids(events: &[SDKEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                SDKEvent::NotificationAlert { notification, .. } => Some(notification.id),
                _ => None,
            })
            .collect()
    }

    fn failed_ops(events: &[SDKEvent]) -> Vec<SyncOperation> {
        events
            .iter()
            .filter_map(|e| match e {
                SDKEvent::OperationFailed { operation, .. } => Some(*operation),
                _ => None,
            })
            .collect()
    }

    fn ids(list: &[Notification]) -> Vec<u64> {
        list.iter().map(|n| n.id).collect()
    }

    #[tokio::test]
    async fn initialize_loads_and_sets_watermark() {
        let api = FakeNotificationApi::with_server(vec![notification(3, true), notification(8, false)]);
        let (engine, mut rx) = engine(api.clone());

        assert_eq!(engine.state().await, SyncState::Uninitialized);
        assert_eq!(assert_ok!(engine.initialize().await), 2);

        assert_eq!(ids(&engine.notifications().await), vec![8, 3]);
        assert_eq!(engine.watermark().await, 8);
        assert_eq!(engine.state().await, SyncState::Synced);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| e.event_type() == "notifications_changed"));
        assert!(alert_ids(&events).is_empty());
    }

    #[tokio::test]
    async fn initialize_with_empty_server_sets_zero_watermark() {
        let (engine, _rx) = engine(FakeNotificationApi::new());
        assert_ok!(engine.initialize().await);
        assert_eq!(engine.watermark().await, 0);
        assert!(engine.is_initialized().await);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let api = FakeNotificationApi::with_server(vec![notification(1, false), notification(2, true)]);
        let (engine, _rx) = engine(api.clone());

        assert_ok!(engine.initialize().await);
        let first = (engine.notifications().await, engine.watermark().await);
        assert_ok!(engine.initialize().await);
        let second = (engine.notifications().await, engine.watermark().await);

        assert_eq!(first, second);
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn initialize_failure_is_surfaced_and_leaves_cache_alone() {
        let api = FakeNotificationApi::new();
        api.fail_list(Some(CoworkSDKError::Transport("connection refused".to_string())));
        let (engine, mut rx) = engine(api.clone());

        assert_err!(engine.initialize().await);
        assert_eq!(engine.state().await, SyncState::Uninitialized);
        assert!(engine.notifications().await.is_empty());
        assert_eq!(failed_ops(&drain(&mut rx)), vec![SyncOperation::Initialize]);

        // 未初始化时不允许轮询
        let err = engine.poll().await.unwrap_err();
        assert!(matches!(err, CoworkSDKError::NotInitialized(_)));

        // 手动重试
        api.fail_list(None);
        api.set_server(vec![notification(4, false)]);
        assert_ok!(engine.initialize().await);
        assert_eq!(engine.watermark().await, 4);
    }

    #[tokio::test]
    async fn poll_merges_unread_and_read_items_and_alerts_once() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        drain(&mut rx);

        api.script_delta(Ok(vec![notification(6, false), notification(7, true)]));
        let outcome = assert_ok!(engine.poll().await);

        assert_eq!(api.since_ids(), vec![5]);
        assert_eq!(ids(&engine.notifications().await), vec![6, 7, 5]);
        assert_eq!(engine.watermark().await, 7);
        assert_eq!(engine.state().await, SyncState::Synced);

        let events = drain(&mut rx);
        assert_eq!(alert_ids(&events), vec![6]);
        match outcome {
            PollOutcome::Applied(report) => {
                assert_eq!(report.fetched, 2);
                assert_eq!(report.inserted, 2);
                assert_eq!(report.alerts, 1);
                assert_eq!(report.watermark, 7);
            }
            PollOutcome::Discarded => panic!("poll should have been applied"),
        }
    }

    #[tokio::test]
    async fn poll_unread_only_policy() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, _rx) = engine_with(
            api.clone(),
            SyncConfig {
                merge_read_items: false,
            },
        );
        assert_ok!(engine.initialize().await);

        api.script_delta(Ok(vec![notification(6, false), notification(7, true)]));
        assert_ok!(engine.poll().await);

        assert_eq!(ids(&engine.notifications().await), vec![6, 5]);
        assert_eq!(engine.watermark().await, 7);

        engine.poll().await.unwrap();
        assert_eq!(api.since_ids(), vec![5, 7]);
    }

    #[tokio::test]
    async fn empty_delta_leaves_everything_unchanged() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false), notification(2, true)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        let before = (engine.notifications().await, engine.watermark().await);
        drain(&mut rx);

        api.script_delta(Ok(Vec::new()));
        assert_ok!(engine.poll().await);

        assert_eq!((engine.notifications().await, engine.watermark().await), before);
        let events = drain(&mut rx);
        assert!(events.iter().all(|e| e.event_type() == "sync_state_changed"));
    }

    #[tokio::test]
    async fn poll_failure_keeps_watermark_and_is_not_user_visible() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        drain(&mut rx);

        api.script_delta(Err(CoworkSDKError::Http {
            status: 502,
            message: "bad gateway".to_string(),
        }));
        assert_err!(engine.poll().await);
        assert_eq!(engine.watermark().await, 5);
        assert_eq!(engine.state().await, SyncState::Synced);
        assert!(failed_ops(&drain(&mut rx)).is_empty());

        // 下次重试使用同一个水位线
        api.push_server(notification(6, false));
        assert_ok!(engine.poll().await);
        assert_eq!(api.since_ids(), vec![5, 5]);
        assert_eq!(engine.watermark().await, 6);
    }

    #[tokio::test]
    async fn malformed_response_does_not_touch_cache() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, _rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);

        api.script_delta(Err(CoworkSDKError::Serialization("expected an array".to_string())));
        assert_err!(engine.poll().await);
        assert_eq!(ids(&engine.notifications().await), vec![5]);
        assert_eq!(engine.watermark().await, 5);
    }

    #[tokio::test]
    async fn unauthorized_poll_emits_session_expired() {
        let api = FakeNotificationApi::with_server(vec![notification(1, false)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        drain(&mut rx);

        api.script_delta(Err(CoworkSDKError::Unauthorized("expired".to_string())));
        assert_err!(engine.poll().await);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| e.event_type() == "session_expired"));
        assert!(failed_ops(&events).is_empty());
    }

    #[tokio::test]
    async fn read_items_already_in_cache_never_alert_again() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);

        api.push_server(notification(6, false));
        assert_ok!(engine.poll().await);
        assert_ok!(engine.mark_read(6).await);
        drain(&mut rx);

        // 服务端再次返回 id=6（违反 since_id 约定），不应再次提醒
        api.script_delta(Ok(vec![notification(6, false)]));
        assert_ok!(engine.poll().await);
        // 正常的下一次轮询没有新数据
        assert_ok!(engine.poll().await);

        assert!(alert_ids(&drain(&mut rx)).is_empty());
        let cached = engine.notifications().await;
        assert!(cached.iter().find(|n| n.id == 6).unwrap().is_read);
        assert_eq!(ids(&cached), vec![6, 5]);
    }

    #[tokio::test]
    async fn mark_read_failure_keeps_local_state() {
        let api = FakeNotificationApi::with_server(vec![notification(6, false)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        drain(&mut rx);

        api.fail_mark_read(Some(CoworkSDKError::Http {
            status: 500,
            message: "internal error".to_string(),
        }));
        let err = engine.mark_read(6).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));

        let cached = engine.notifications().await;
        assert!(!cached[0].is_read);
        assert_eq!(engine.unread_count().await, 1);
        assert_eq!(failed_ops(&drain(&mut rx)), vec![SyncOperation::MarkRead]);
    }

    #[tokio::test]
    async fn mark_read_returns_navigation_target() {
        let api = FakeNotificationApi::with_server(vec![
            notification_with_target(3, false, "/tickets/3/"),
            notification(2, false),
        ]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        drain(&mut rx);

        let outcome = assert_ok!(engine.mark_read(3).await);
        assert!(outcome.found);
        assert_eq!(outcome.navigate_to.as_deref(), Some("/tickets/3/"));
        assert_eq!(engine.unread_count().await, 1);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            SDKEvent::NavigationRequested { notification_id: 3, target_url, .. } if target_url == "/tickets/3/"
        )));

        let outcome = assert_ok!(engine.mark_read(2).await);
        assert_eq!(outcome.navigate_to, None);
    }

    #[tokio::test]
    async fn mark_read_of_unknown_id_still_calls_server() {
        let api = FakeNotificationApi::with_server(vec![notification(1, false)]);
        let (engine, _rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);

        let outcome = assert_ok!(engine.mark_read(42).await);
        assert!(!outcome.found);
        assert_eq!(api.mark_read_calls(), vec![42]);
        assert_eq!(engine.unread_count().await, 1);
    }

    #[tokio::test]
    async fn mark_all_read_converges() {
        let api = FakeNotificationApi::with_server(vec![
            notification(1, false),
            notification(2, true),
            notification(3, false),
        ]);
        let (engine, _rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);

        api.fail_mark_all(Some(CoworkSDKError::Timeout("10s".to_string())));
        assert_err!(engine.mark_all_read().await);
        assert_eq!(engine.unread_count().await, 2);

        api.fail_mark_all(None);
        assert_eq!(assert_ok!(engine.mark_all_read().await), 2);
        assert!(engine.notifications().await.iter().all(|n| n.is_read));
        assert_eq!(api.mark_all_calls(), 2);
    }

    #[tokio::test]
    async fn late_poll_response_after_reset_is_discarded() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, _rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);

        let gate = api.hold_check_new();
        api.push_server(notification(6, false));

        let poll_engine = engine.clone();
        let pending = tokio::spawn(async move { poll_engine.poll().await });

        while api.since_ids().is_empty() {
            tokio::task::yield_now().await;
        }
        engine.reset().await;
        gate.notify_one();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, PollOutcome::Discarded);
        assert!(engine.notifications().await.is_empty());
        assert_eq!(engine.watermark().await, 0);
        assert_eq!(engine.state().await, SyncState::Uninitialized);
    }

    #[tokio::test]
    async fn concurrent_polls_do_not_double_alert() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let (engine, mut rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);
        drain(&mut rx);

        api.push_server(notification(6, false));
        let (a, b) = tokio::join!(engine.poll(), engine.poll());
        assert_ok!(a);
        assert_ok!(b);

        assert_eq!(alert_ids(&drain(&mut rx)), vec![6]);
        assert_eq!(api.since_ids(), vec![5, 6]);
    }

    #[tokio::test]
    async fn watermark_is_monotonic_across_mixed_outcomes() {
        let api = FakeNotificationApi::with_server(vec![notification(10, true)]);
        let (engine, _rx) = engine(api.clone());
        assert_ok!(engine.initialize().await);

        let script: Vec<Result<Vec<Notification>>> = vec![
            Ok(vec![]),
            Ok(vec![notification(12, false)]),
            Err(CoworkSDKError::Transport("reset".to_string())),
            Ok(vec![notification(11, true)]),
            Ok(vec![]),
            Ok(vec![notification(30, true), notification(14, false)]),
        ];
        let mut last = engine.watermark().await;
        for response in script {
            api.script_delta(response);
            let _ = engine.poll().await;
            let current = engine.watermark().await;
            assert!(current >= last);
            last = current;
        }
        assert_eq!(last, 30);
    }

    #[tokio::test]
    async fn logout_snapshot_is_never_overtaken_by_a_late_poll() {
        let api = FakeNotificationApi::with_server(vec![notification(5, false)]);
        let events = Arc::new(EventManager::new(1000));
        let engine = Arc::new(NotificationSyncEngine::new(
            api.clone(),
            events.clone(),
            SyncConfig::default(),
        ));
        assert_ok!(engine.initialize().await);

        let snapshots = Arc::new(parking_lot::Mutex::new(Vec::<Vec<u64>>::new()));
        let seen = snapshots.clone();
        events
            .add_listener("notifications_changed", move |event| {
                if let SDKEvent::NotificationsChanged { notifications, .. } = event {
                    seen.lock().push(notifications.iter().map(|n| n.id).collect());
                }
            })
            .await;

        let gate = api.hold_check_new();
        api.push_server(notification(6, false));
        let poll_engine = engine.clone();
        let pending_poll = tokio::spawn(async move { poll_engine.poll().await });
        while api.since_ids().is_empty() {
            tokio::task::yield_now().await;
        }

        // 事件发送被阻塞时放行轮询响应，随后登出
        let hold = events.hold_emits().await;
        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let reset_engine = engine.clone();
        let pending_reset = tokio::spawn(async move { reset_engine.reset().await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        drop(hold);

        let outcome = pending_poll.await.unwrap().unwrap();
        pending_reset.await.unwrap();

        assert!(matches!(outcome, PollOutcome::Applied(_)));
        assert!(engine.notifications().await.is_empty());
        let snapshots = snapshots.lock();
        assert_eq!(snapshots.last(), Some(&Vec::new()));
        assert!(snapshots.contains(&vec![6, 5]));
    }
}
