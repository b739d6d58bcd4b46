use async_trait::async_trait;

use crate::error::Result;
use crate::notification::Notification;

/// Notification Service 客户端 trait
///
/// 同步引擎只依赖此 trait，默认实现是基于 reqwest 的 `NotificationHttpClient`；
/// 测试与推送通道替换都从这里接入。
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// 拉取全部通知
    async fn list_all(&self) -> Result<Vec<Notification>>;

    /// 拉取 id > since_id 的新通知
    async fn check_new(&self, since_id: u64) -> Result<Vec<Notification>>;

    /// 标记单条已读
    async fn mark_read(&self, id: u64) -> Result<()>;

    /// 全部标记已读
    async fn mark_all_read(&self) -> Result<()>;
}
