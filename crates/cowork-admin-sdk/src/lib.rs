//! Cowork Admin SDK - 管理台通知同步
//!
//! 本 SDK 为共享办公预订平台的管理台提供通知同步能力：
//! - 📥 全量加载 + 按水位线增量轮询（since_id）
//! - 🔁 去重合并，保留本地已读状态
//! - 🔔 新未读通知提醒、深链跳转
//! - ✅ 单条 / 全部标记已读（服务端确认后生效）
//! - ⏱️ 定时轮询，失败指数退避，前后台切换暂停 / 恢复
//! - ⚙️ 事件系统：广播、按类型监听与类型化观察者
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use cowork_admin_sdk::{AuthCredentials, CoworkAdminSDK, CoworkConfig, SDKEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = CoworkConfig::builder()
//!         .base_url("https://admin.cowork.example.com")
//!         .polling_interval(10)
//!         .build();
//!
//!     // 初始化 SDK
//!     let sdk = CoworkAdminSDK::initialize(config).await?;
//!
//!     // 订阅事件
//!     let mut events = sdk.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let SDKEvent::NotificationAlert { notification, .. } = event {
//!                 println!("新通知: {}", notification.message);
//!             }
//!         }
//!     });
//!
//!     // 登录后开始会话
//!     sdk.start_session(AuthCredentials::Bearer("token".to_string())).await?;
//!
//!     // 标记已读，并按返回的深链跳转
//!     if let Some(first) = sdk.notifications().await.first() {
//!         let outcome = sdk.mark_read(first.id).await?;
//!         if let Some(url) = outcome.navigate_to {
//!             println!("跳转到: {}", url);
//!         }
//!     }
//!
//!     // 登出并关闭
//!     sdk.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod api;
pub mod error;
pub mod events;
pub mod http_client;
pub mod lifecycle;
pub mod notification;
pub mod sdk;
pub mod sync;
pub mod version;

// 重新导出核心类型，方便使用
pub use api::NotificationApi;
pub use error::{CoworkSDKError, Result};
pub use events::{
    event_builders, EventFilter, EventManager, EventStats, FilteredEventReceiver,
    NotificationObserver, SDKEvent,
};
pub use http_client::{AuthCredentials, NotificationHttpClient};
pub use lifecycle::{LifecycleHook, LifecycleManager, PollingLifecycleHook};
pub use notification::{CheckNewResponse, Notification, NotificationType};
pub use sdk::{
    validate_config, CoworkAdminSDK, CoworkConfig, CoworkConfigBuilder, EventConfig,
    HttpClientConfig, NotificationEndpoints, PollingConfig, SyncConfig,
};
pub use sync::{
    MarkReadOutcome, NotificationPoller, NotificationSyncEngine, PollOutcome, PollReport,
    SyncOperation, SyncState,
};
pub use version::{SDK_NAME, SDK_VERSION};
