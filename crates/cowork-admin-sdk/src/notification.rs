//! 通知数据模型
//!
//! 与服务端 Notification Service 的 JSON 结构一一对应。

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// 通知类型
///
/// 只影响图标与展示样式，不影响同步行为。服务端新增的未知类型统一落到 `Other`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    User,
    Booking,
    Ticket,
    #[default]
    #[serde(other)]
    Other,
}

impl NotificationType {
    /// 获取类型字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::User => "user",
            NotificationType::Booking => "booking",
            NotificationType::Ticket => "ticket",
            NotificationType::Other => "other",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// 服务端分配的单调递增 ID，同时作为排序键与水位线
    pub id: u64,
    /// 展示文本
    pub message: String,
    /// 通知类型
    #[serde(rename = "type", default)]
    pub notification_type: NotificationType,
    /// 深链路径，格式 `/<section>/...`
    #[serde(default)]
    pub target_url: Option<String>,
    /// 是否已读（以服务端为准）
    pub is_read: bool,
    /// 创建时间，仅用于展示
    ///
    /// 接受 RFC 3339、不带时区的 `YYYY-MM-DD[T ]HH:MM:SS[.f]`（按 UTC）与 Unix 秒；
    /// 缺失或无法识别时为 Unix 纪元，不影响同步。
    #[serde(default, deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// 深链所属的一级栏目，例如 `/bookings/42/` → `bookings`
    pub fn target_section(&self) -> Option<&str> {
        self.target_url
            .as_deref()
            .and_then(|url| url.trim_start_matches('/').split('/').next())
            .filter(|section| !section.is_empty())
    }

    /// 是否带有可跳转的深链
    pub fn has_target(&self) -> bool {
        self.target_url.as_deref().map_or(false, |url| !url.trim().is_empty())
    }
}

fn deserialize_created_at<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &value {
        serde_json::Value::String(s) => parse_timestamp(s),
        serde_json::Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(|| {
        debug!("无法识别的 created_at: {}，按纪元处理", value);
        DateTime::<Utc>::default()
    }))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// check_new 接口响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckNewResponse {
    /// 服务端约定：每一项的 id 都大于请求中的 since_id
    pub recent_notifications: Vec<Notification>,
}
