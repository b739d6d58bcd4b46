//! 通知同步演示
//!
//! 用内存版 Notification Service 模拟服务端，展示全量加载、增量轮询、
//! 提醒、标记已读与深链跳转、前后台切换。

use async_trait::async_trait;
use chrono::Utc;
use cowork_admin_sdk::{
    AuthCredentials, CoworkAdminSDK, CoworkConfig, Notification, NotificationApi,
    NotificationObserver, NotificationType, Result, SyncOperation,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// 内存版服务端
#[derive(Default)]
struct InMemoryNotificationService {
    notifications: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationService {
    fn publish(&self, message: &str, notification_type: NotificationType, target_url: Option<&str>) {
        let mut notifications = self.notifications.lock();
        let id = notifications.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        notifications.push(Notification {
            id,
            message: message.to_string(),
            notification_type,
            target_url: target_url.map(str::to_string),
            is_read: false,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl NotificationApi for InMemoryNotificationService {
    async fn list_all(&self) -> Result<Vec<Notification>> {
        let mut list = self.notifications.lock().clone();
        list.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(list)
    }

    async fn check_new(&self, since_id: u64) -> Result<Vec<Notification>> {
        Ok(self
            .notifications
            .lock()
            .iter()
            .filter(|n| n.id > since_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: u64) -> Result<()> {
        if let Some(n) = self.notifications.lock().iter_mut().find(|n| n.id == id) {
            n.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        for n in self.notifications.lock().iter_mut() {
            n.is_read = true;
        }
        Ok(())
    }
}

/// 控制台观察者
struct ConsoleObserver;

impl NotificationObserver for ConsoleObserver {
    fn on_notifications_changed(&self, notifications: &[Notification], unread_count: usize) {
        println!("📋 列表更新: 共 {} 条, 未读 {}", notifications.len(), unread_count);
    }

    fn on_alert(&self, notification: &Notification) {
        println!("🔔 [{}] {}", notification.notification_type, notification.message);
    }

    fn on_error(&self, operation: SyncOperation, message: &str) {
        println!("❌ {} 失败: {}", operation.as_str(), message);
    }

    fn on_navigate(&self, notification_id: u64, target_url: &str) {
        println!("➡️ 通知 #{} 跳转到 {}", notification_id, target_url);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n==============================================");
    println!("🏢 Cowork Admin 通知同步演示");
    println!("==============================================\n");

    let service = Arc::new(InMemoryNotificationService::default());
    service.publish("新用户注册: alice", NotificationType::User, Some("/users/1/"));
    service.publish("会议室 A 预订已确认", NotificationType::Booking, None);

    let config = CoworkConfig::builder()
        .base_url("http://localhost:8000")
        .polling_interval(1)
        .build();
    let sdk = CoworkAdminSDK::initialize_with_api(config, service.clone()).await?;
    sdk.add_observer(Arc::new(ConsoleObserver)).await;

    // 1. 开始会话：全量加载
    sdk.start_session(AuthCredentials::Bearer("demo-token".to_string()))
        .await?;

    // 2. 服务端产生新通知，轮询拉取
    service.publish("工单 #42: 空调故障", NotificationType::Ticket, Some("/tickets/42/"));
    sleep(Duration::from_millis(1500)).await;

    // 3. 标记已读并跳转
    let outcome = sdk.mark_read(3).await?;
    println!("mark_read(3) → navigate_to = {:?}", outcome.navigate_to);

    // 4. 后台期间不轮询，回到前台立即补拉
    sdk.notify_background().await?;
    service.publish("预订取消: 工位 B12", NotificationType::Booking, None);
    sleep(Duration::from_millis(1500)).await;
    println!("后台期间未读数: {}", sdk.unread_count().await);
    sdk.notify_foreground().await?;
    println!("回到前台后未读数: {}", sdk.unread_count().await);

    // 5. 全部已读，登出
    let changed = sdk.mark_all_read().await?;
    println!("全部已读: {} 条", changed);
    sdk.shutdown().await?;

    println!("\n==============================================");
    println!("✅ 演示完成");
    println!("==============================================\n");
    Ok(())
}
