//! 客户端错误类型
//!
//! 业务结果（订阅缺失、冲突、激活错误码）都以值的形式返回，
//! 这里只包含格式错误、传输错误和本地存储错误。

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// 扫描内容不是 64 位十六进制指纹
    #[error("二维码内容无效，应为 64 位十六进制指纹")]
    InvalidQr,

    /// 网络层失败（连接失败、超时等）
    #[error("网络请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    /// 服务端返回非 2xx 且无法解释为业务结果
    #[error("服务端返回错误 ({status}): {message}")]
    Http { status: StatusCode, message: String },

    /// 响应体无法解析或字段组合不合法
    #[error("无法解析服务端响应: {0}")]
    Decode(String),

    /// 服务端明确拒绝了请求（如重新生成许可证失败）
    #[error("请求被拒绝: {0}")]
    Rejected(String),

    #[error("配置错误: {0}")]
    Config(String),

    /// 本地持久化失败（选中展台、凭据）
    #[error("本地存储失败: {0}")]
    Store(String),
}

impl ClientError {
    /// 是否可以由用户选择“重试”
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Decode(_) => true,
            ClientError::Http { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ClientError::InvalidQr
            | ClientError::Rejected(_)
            | ClientError::Config(_)
            | ClientError::Store(_) => false,
        }
    }

    /// 是否为请求超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_timeout())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
