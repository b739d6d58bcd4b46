//! 统一 SDK 接口 - CoworkAdminSDK 主入口
//!
//! 分层架构设计：
//! ```text
//! CoworkAdminSDK (会话层)
//!   ├── NotificationHttpClient (传输层，NotificationApi 默认实现)
//!   ├── NotificationSyncEngine (同步层：缓存 + 水位线)
//!   ├── NotificationPoller (定时轮询 + 退避)
//!   ├── EventManager (事件系统层)
//!   └── LifecycleManager (前后台切换)
//! ```
//!
//! 设计原则：
//! - 异步优先：所有 API 使用 async/await
//! - 事件驱动：引擎只发事件，不关心渲染
//! - 会话隔离：登出即停止轮询并清空缓存

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::api::NotificationApi;
use crate::error::{CoworkSDKError, Result};
use crate::events::{EventFilter, EventManager, FilteredEventReceiver, NotificationObserver, SDKEvent};
use crate::http_client::{AuthCredentials, NotificationHttpClient};
use crate::lifecycle::{LifecycleManager, PollingLifecycleHook};
use crate::notification::Notification;
use crate::sync::backoff::MAX_DELAY_SECS;
use crate::sync::{
    MarkReadOutcome, NotificationPoller, NotificationSyncEngine, PollOutcome, SyncState,
};

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
    /// 自定义 User-Agent，None 时使用 `cowork-admin-sdk/<版本>`
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(30),
            user_agent: None,
        }
    }
}

/// Notification Service 路径
///
/// `mark_read_path` 中的 `{id}` 会被替换为通知 id。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationEndpoints {
    pub list_path: String,
    pub check_new_path: String,
    pub mark_read_path: String,
    pub mark_all_read_path: String,
    /// check_new 的查询参数名
    pub since_id_param: String,
}

impl Default for NotificationEndpoints {
    fn default() -> Self {
        Self {
            list_path: "/api/notifications/".to_string(),
            check_new_path: "/api/notifications/check_new/".to_string(),
            mark_read_path: "/api/notifications/{id}/mark_read/".to_string(),
            mark_all_read_path: "/api/notifications/mark_all_read/".to_string(),
            since_id_param: "since_id".to_string(),
        }
    }
}

/// 轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// 轮询间隔（秒）
    pub interval_secs: u64,
    /// 连续失败时是否退避
    pub backoff_enabled: bool,
    /// 指数退避因子
    pub backoff_multiplier: f64,
    /// 退避上限（秒）
    pub max_backoff_secs: u64,
    /// 抖动比例，0.1 表示 ±10%
    pub jitter_factor: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            backoff_enabled: true,
            backoff_multiplier: 2.0,
            max_backoff_secs: 120,
            jitter_factor: 0.1,
        }
    }
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 增量响应中的已读项是否也插入列表
    ///
    /// 关闭后只插入未读项，已读项只推进水位线。
    pub merge_read_items: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            merge_read_items: true,
        }
    }
}

/// 事件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// 事件缓冲区大小
    pub buffer_size: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Cowork Admin SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoworkConfig {
    /// 管理后台服务地址，例如 https://admin.example.com
    pub base_url: String,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 接口路径
    pub endpoints: NotificationEndpoints,
    /// 轮询配置
    pub polling: PollingConfig,
    /// 同步配置
    pub sync: SyncConfig,
    /// 事件配置
    pub event_config: EventConfig,
    /// 切到后台时暂停轮询
    pub pause_in_background: bool,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for CoworkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            http_client_config: HttpClientConfig::default(),
            endpoints: NotificationEndpoints::default(),
            polling: PollingConfig::default(),
            sync: SyncConfig::default(),
            event_config: EventConfig::default(),
            pause_in_background: true,
            debug_mode: false,
        }
    }
}

impl CoworkConfig {
    pub fn builder() -> CoworkConfigBuilder {
        CoworkConfigBuilder::new()
    }

    /// 从 JSON 读取配置，缺省字段取默认值
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// 配置构建器
pub struct CoworkConfigBuilder {
    config: CoworkConfig,
}

impl CoworkConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CoworkConfig::default(),
        }
    }

    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn endpoints(mut self, endpoints: NotificationEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    /// 轮询间隔（秒）
    pub fn polling_interval(mut self, secs: u64) -> Self {
        self.config.polling.interval_secs = secs;
        self
    }

    pub fn polling_config(mut self, config: PollingConfig) -> Self {
        self.config.polling = config;
        self
    }

    pub fn merge_read_items(mut self, enabled: bool) -> Self {
        self.config.sync.merge_read_items = enabled;
        self
    }

    pub fn event_config(mut self, config: EventConfig) -> Self {
        self.config.event_config = config;
        self
    }

    pub fn pause_in_background(mut self, enabled: bool) -> Self {
        self.config.pause_in_background = enabled;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> CoworkConfig {
        self.config
    }
}

impl Default for CoworkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 验证配置
pub fn validate_config(config: &CoworkConfig) -> Result<()> {
    if config.base_url.trim().is_empty() {
        return Err(CoworkSDKError::Config("服务地址不能为空".to_string()));
    }

    let url = reqwest::Url::parse(&config.base_url)
        .map_err(|e| CoworkSDKError::Config(format!("服务地址无效: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CoworkSDKError::Config(format!(
            "服务地址只支持 http/https: {}",
            config.base_url
        )));
    }

    let polling = &config.polling;
    if polling.interval_secs == 0 {
        return Err(CoworkSDKError::Config("轮询间隔不能为0".to_string()));
    }
    if polling.interval_secs > MAX_DELAY_SECS || polling.max_backoff_secs > MAX_DELAY_SECS {
        return Err(CoworkSDKError::Config(format!(
            "轮询间隔与退避上限不能超过 {}s",
            MAX_DELAY_SECS
        )));
    }
    if !(0.0..=1.0).contains(&polling.jitter_factor) {
        return Err(CoworkSDKError::Config(format!(
            "抖动比例必须在 [0, 1] 之间: {}",
            polling.jitter_factor
        )));
    }
    if polling.backoff_enabled
        && !(polling.backoff_multiplier.is_finite() && polling.backoff_multiplier >= 1.0)
    {
        return Err(CoworkSDKError::Config("退避因子不能小于1".to_string()));
    }

    if !config.endpoints.mark_read_path.contains("{id}") {
        return Err(CoworkSDKError::Config(
            "mark_read_path 必须包含 {id} 占位符".to_string(),
        ));
    }

    if config.event_config.buffer_size == 0 {
        return Err(CoworkSDKError::Config("事件缓冲区大小不能为0".to_string()));
    }

    Ok(())
}

/// 统一 SDK 主接口
pub struct CoworkAdminSDK {
    /// SDK 配置
    config: CoworkConfig,

    /// HTTP 客户端，自定义 NotificationApi 时为 None
    http_client: Option<Arc<NotificationHttpClient>>,

    /// 事件管理器
    event_manager: Arc<EventManager>,

    /// 同步引擎
    sync_engine: Arc<NotificationSyncEngine>,

    /// 轮询器
    poller: Arc<NotificationPoller>,

    /// 生命周期管理器
    lifecycle_manager: Arc<RwLock<LifecycleManager>>,

    /// 是否有活跃会话
    session_active: Arc<RwLock<bool>>,

    /// 是否已初始化
    initialized: Arc<RwLock<bool>>,

    /// 是否正在关闭
    shutting_down: Arc<RwLock<bool>>,
}

impl CoworkAdminSDK {
    /// 初始化 SDK，使用内置的 HTTP 客户端
    pub async fn initialize(config: CoworkConfig) -> Result<Arc<Self>> {
        validate_config(&config)?;

        let http_client = Arc::new(NotificationHttpClient::new(
            &config.http_client_config,
            config.base_url.clone(),
            config.endpoints.clone(),
            AuthCredentials::None,
        )?);
        let api: Arc<dyn NotificationApi> = http_client.clone();

        Self::build(config, api, Some(http_client)).await
    }

    /// 使用自定义的 NotificationApi 初始化（替换传输层）
    pub async fn initialize_with_api(
        config: CoworkConfig,
        api: Arc<dyn NotificationApi>,
    ) -> Result<Arc<Self>> {
        validate_config(&config)?;
        Self::build(config, api, None).await
    }

    async fn build(
        config: CoworkConfig,
        api: Arc<dyn NotificationApi>,
        http_client: Option<Arc<NotificationHttpClient>>,
    ) -> Result<Arc<Self>> {
        info!(
            "正在初始化 CoworkAdminSDK {} ({})...",
            crate::version::SDK_VERSION,
            crate::version::GIT_SHA
        );
        if config.debug_mode {
            debug!("SDK 配置: {:?}", config);
        }

        let event_manager = Arc::new(EventManager::new(config.event_config.buffer_size));
        let sync_engine = Arc::new(NotificationSyncEngine::new(
            api,
            event_manager.clone(),
            config.sync.clone(),
        ));
        let poller = Arc::new(NotificationPoller::new(
            sync_engine.clone(),
            config.polling.clone(),
        ));

        let mut lifecycle_manager = LifecycleManager::new();
        lifecycle_manager.register_hook(Arc::new(PollingLifecycleHook::new(
            poller.clone(),
            config.pause_in_background,
        )));

        let sdk = Arc::new(Self {
            config,
            http_client,
            event_manager,
            sync_engine,
            poller,
            lifecycle_manager: Arc::new(RwLock::new(lifecycle_manager)),
            session_active: Arc::new(RwLock::new(false)),
            initialized: Arc::new(RwLock::new(true)),
            shutting_down: Arc::new(RwLock::new(false)),
        });

        info!("✅ CoworkAdminSDK 初始化完成");
        Ok(sdk)
    }

    /// 开始会话（登录或会话恢复后调用）
    ///
    /// 安装凭证、全量加载、启动轮询。全量加载失败时仍会启动轮询，
    /// 下一次定时器触发时自动重试，错误同时返回给调用方。
    pub async fn start_session(&self, credentials: AuthCredentials) -> Result<()> {
        self.check_initialized().await?;

        if *self.session_active.read().await {
            info!("已有活跃会话，先结束旧会话");
            self.end_session().await?;
        }

        match &self.http_client {
            Some(client) => client.set_credentials(credentials),
            None => debug!("使用自定义 NotificationApi，忽略凭证"),
        }
        *self.session_active.write().await = true;

        info!("🔐 会话开始");
        let initial_load = self.sync_engine.initialize().await;
        self.poller.start();

        match initial_load {
            Ok(count) => {
                info!("✅ 会话就绪: 已加载 {} 条通知", count);
                Ok(())
            }
            Err(e) => {
                warn!("⚠️ 首次加载失败，轮询将自动重试: {}", e);
                Err(e)
            }
        }
    }

    /// 结束会话（登出）：停止轮询，清空缓存与凭证
    pub async fn end_session(&self) -> Result<()> {
        info!("正在结束会话...");

        self.poller.stop();
        self.sync_engine.reset().await;
        if let Some(client) = &self.http_client {
            client.set_credentials(AuthCredentials::None);
        }
        *self.session_active.write().await = false;

        info!("✅ 会话已结束");
        Ok(())
    }

    /// 关闭 SDK，之后的调用都会失败
    pub async fn shutdown(&self) -> Result<()> {
        info!("正在关闭 CoworkAdminSDK...");

        {
            let mut shutting_down = self.shutting_down.write().await;
            *shutting_down = true;
        }

        self.end_session().await?;
        self.event_manager.clear_listeners().await;

        {
            let mut initialized = self.initialized.write().await;
            *initialized = false;
        }

        info!("CoworkAdminSDK 关闭完成");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.shutting_down.read().await
    }

    pub async fn has_session(&self) -> bool {
        *self.session_active.read().await
    }

    pub fn config(&self) -> &CoworkConfig {
        &self.config
    }

    // ========== 通知 ==========

    /// 本地通知列表（新到旧）
    pub async fn notifications(&self) -> Vec<Notification> {
        self.sync_engine.notifications().await
    }

    pub async fn unread_count(&self) -> usize {
        self.sync_engine.unread_count().await
    }

    pub async fn watermark(&self) -> u64 {
        self.sync_engine.watermark().await
    }

    pub async fn sync_state(&self) -> SyncState {
        self.sync_engine.state().await
    }

    /// 标记已读；返回值中的 `navigate_to` 为需要跳转的深链
    pub async fn mark_read(&self, id: u64) -> Result<MarkReadOutcome> {
        self.check_session().await?;
        self.sync_engine.mark_read(id).await
    }

    pub async fn mark_all_read(&self) -> Result<usize> {
        self.check_session().await?;
        self.sync_engine.mark_all_read().await
    }

    /// 重新全量加载
    pub async fn refresh(&self) -> Result<usize> {
        self.check_session().await?;
        self.sync_engine.initialize().await
    }

    /// 立即轮询一次
    pub async fn poll_now(&self) -> Result<PollOutcome> {
        self.check_session().await?;
        self.poller.poll_now().await
    }

    // ========== 事件 ==========

    pub fn subscribe(&self) -> broadcast::Receiver<SDKEvent> {
        self.event_manager.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        self.event_manager.subscribe_filtered(filter)
    }

    pub async fn add_observer(&self, observer: Arc<dyn NotificationObserver>) {
        self.event_manager.add_observer(observer).await;
    }

    pub fn event_manager(&self) -> Arc<EventManager> {
        self.event_manager.clone()
    }

    // ========== 生命周期 ==========

    /// 管理台切换到后台
    pub async fn notify_background(&self) -> Result<()> {
        self.check_initialized().await?;
        self.lifecycle_manager.read().await.notify_background().await
    }

    /// 管理台回到前台
    pub async fn notify_foreground(&self) -> Result<()> {
        self.check_initialized().await?;
        self.lifecycle_manager.read().await.notify_foreground().await
    }

    /// 检查是否已初始化
    async fn check_initialized(&self) -> Result<()> {
        if self.is_shutting_down().await {
            return Err(CoworkSDKError::ShuttingDown("SDK 正在关闭".to_string()));
        }

        if !self.is_initialized().await {
            return Err(CoworkSDKError::NotInitialized("SDK 未初始化".to_string()));
        }

        Ok(())
    }

    /// 检查是否有活跃会话
    async fn check_session(&self) -> Result<()> {
        self.check_initialized().await?;

        if !self.has_session().await {
            return Err(CoworkSDKError::SessionClosed("没有活跃会话".to_string()));
        }

        Ok(())
    }
}
