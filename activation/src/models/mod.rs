use serde::{Deserialize, Serialize};

// 展台相关模型
mod booth;
pub use booth::*;

// 激活相关模型
mod activation;
pub use activation::*;
pub(crate) use activation::{ActivateResponse, RegenerateRequest, RegenerateResponse};

/// API 错误响应
///
/// 后端在非 2xx 响应中返回，`error_code` 只在激活接口出现
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_code: Option<ActivationErrorCode>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiErrorBody {
    /// 服务端给出的说明，优先使用 `message`
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.detail.as_deref())
    }
}
