use thiserror::Error;

/// SDK 统一错误类型
#[derive(Debug, Clone, Error)]
pub enum CoworkSDKError {
    /// 网络层错误（连接失败、连接被重置等）
    #[error("Transport error: {0}")]
    Transport(String),
    /// 请求超时
    #[error("Timeout: {0}")]
    Timeout(String),
    /// 服务端返回 401，会话已失效
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// 服务端返回非 2xx 状态码
    #[error("HTTP error [{status}]: {message}")]
    Http { status: u16, message: String },
    /// 响应体无法解析（缺字段、不是数组等）
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),
    /// 未初始化（尚未完成首次全量加载）
    #[error("Not initialized: {0}")]
    NotInitialized(String),
    /// 正在关闭
    #[error("Shutting down: {0}")]
    ShuttingDown(String),
    /// 会话已结束（登出后返回的迟到响应）
    #[error("Session closed: {0}")]
    SessionClosed(String),
    #[error("Other error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for CoworkSDKError {
    fn from(error: serde_json::Error) -> Self {
        CoworkSDKError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for CoworkSDKError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            CoworkSDKError::Timeout(error.to_string())
        } else if error.is_decode() {
            CoworkSDKError::Serialization(error.to_string())
        } else if let Some(status) = error.status() {
            CoworkSDKError::from_status(status.as_u16(), error.to_string())
        } else {
            CoworkSDKError::Transport(error.to_string())
        }
    }
}

impl CoworkSDKError {
    /// 根据 HTTP 状态码创建错误（401 单独归类为 Unauthorized）
    pub fn from_status(status: u16, message: String) -> Self {
        if status == 401 {
            CoworkSDKError::Unauthorized(message)
        } else {
            CoworkSDKError::Http { status, message }
        }
    }

    /// 获取 HTTP 状态码（如果有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CoworkSDKError::Http { status, .. } => Some(*status),
            CoworkSDKError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    /// 判断是否是认证失效
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CoworkSDKError::Unauthorized(_))
    }

    /// 判断是否是可在下个周期重试的临时错误
    ///
    /// 5xx、429、网络与超时视为临时错误；其余 4xx 与解析错误不是。
    pub fn is_transient(&self) -> bool {
        match self {
            CoworkSDKError::Transport(_) | CoworkSDKError::Timeout(_) => true,
            CoworkSDKError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoworkSDKError>;
