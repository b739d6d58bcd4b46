//! HTTP 客户端模块 - Notification Service 的 reqwest 实现
//!
//! 本模块提供 `NotificationApi` 的默认实现：
//! - 全量拉取 / 增量拉取（check_new）
//! - 单条标记已读 / 全部标记已读
//! - Bearer 或 Cookie 认证，可在会话恢复时替换
//!
//! 每个请求都带 `X-Request-Id`，与日志中的 request_id 对应，便于和服务端日志对照。

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::NotificationApi;
use crate::error::{CoworkSDKError, Result};
use crate::notification::{CheckNewResponse, Notification};
use crate::sdk::{HttpClientConfig, NotificationEndpoints};

const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// 认证方式
///
/// 认证流程本身由宿主负责，这里只携带已经拿到的凭证。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthCredentials {
    /// 不携带认证信息
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// 原样放入 `Cookie` 头，例如 `sessionid=...; csrftoken=...`
    Cookie(String),
}

/// Notification Service HTTP 客户端
pub struct NotificationHttpClient {
    client: Client,
    base_url: String,
    endpoints: NotificationEndpoints,
    credentials: RwLock<AuthCredentials>,
}

impl NotificationHttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new(
        config: &HttpClientConfig,
        base_url: impl Into<String>,
        endpoints: NotificationEndpoints,
        credentials: AuthCredentials,
    ) -> Result<Self> {
        let mut builder = Client::builder().user_agent(
            config
                .user_agent
                .clone()
                .unwrap_or_else(crate::version::user_agent),
        );

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| CoworkSDKError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = base_url.into();
        info!("✅ HTTP 客户端已创建 (base_url: {})", base_url);

        Ok(Self {
            client,
            base_url,
            endpoints,
            credentials: RwLock::new(credentials),
        })
    }

    /// 替换认证凭证（登录 / 会话恢复时调用）
    pub fn set_credentials(&self, credentials: AuthCredentials) {
        *self.credentials.write() = credentials;
    }

    /// 是否已设置凭证
    pub fn has_credentials(&self) -> bool {
        !matches!(*self.credentials.read(), AuthCredentials::None)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 拼接完整 URL
    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    fn mark_read_url(&self, id: u64) -> String {
        self.url(&self.endpoints.mark_read_path.replace("{id}", &id.to_string()))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &*self.credentials.read() {
            AuthCredentials::None => builder,
            AuthCredentials::Bearer(token) => builder.bearer_auth(token),
            AuthCredentials::Cookie(cookie) => builder.header(COOKIE, cookie.as_str()),
        }
    }

    /// 发送请求并检查状态码，非 2xx 转换为错误
    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<Response> {
        let request_id = Uuid::new_v4().to_string();
        debug!("➡️ {} request_id={}", operation, request_id);

        let response = self
            .authorize(builder)
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .send()
            .await
            .map_err(|e| {
                let err = CoworkSDKError::from(e);
                debug!("{} 请求失败 request_id={}: {}", operation, request_id, err);
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            warn!(
                "⚠️ {} 失败，HTTP 状态码: {}, request_id={}, 错误: {}",
                operation, status, request_id, error_text
            );
            return Err(CoworkSDKError::from_status(
                status.as_u16(),
                format!("{} 失败 ({})", operation, error_text),
            ));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        operation: &str,
    ) -> Result<T> {
        let response = self.send(builder, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CoworkSDKError::Serialization(format!("解析 {} 响应失败: {}", operation, e)))
    }
}

#[async_trait]
impl NotificationApi for NotificationHttpClient {
    async fn list_all(&self) -> Result<Vec<Notification>> {
        let builder = self.client.get(self.url(&self.endpoints.list_path));
        let list: Vec<Notification> = self.get_json(builder, "list_notifications").await?;
        debug!("全量拉取通知 {} 条", list.len());
        Ok(list)
    }

    async fn check_new(&self, since_id: u64) -> Result<Vec<Notification>> {
        let builder = self
            .client
            .get(self.url(&self.endpoints.check_new_path))
            .query(&[(self.endpoints.since_id_param.as_str(), since_id)]);
        let response: CheckNewResponse = self.get_json(builder, "check_new").await?;
        Ok(response.recent_notifications)
    }

    async fn mark_read(&self, id: u64) -> Result<()> {
        let builder = self.client.post(self.mark_read_url(id));
        self.send(builder, "mark_read").await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<()> {
        let builder = self.client.post(self.url(&self.endpoints.mark_all_read_path));
        self.send(builder, "mark_all_read").await?;
        Ok(())
    }
}
