//! 展台激活相关模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ClientError;
use crate::fingerprint::Fingerprint;

/// POST /licensing/activate-booth/pre-check 请求体
#[derive(Debug, Clone, Serialize)]
pub struct PreCheckRequest<'a> {
    pub fingerprint: &'a Fingerprint,
    pub booth_id: &'a str,
}

/// 预检结果
///
/// `can_proceed = false` 当且仅当目标展台没有有效订阅；
/// 冲突本身不会阻止激活，只要求用户确认。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreCheckResult {
    pub booth_id: String,
    #[serde(default)]
    pub booth_name: Option<String>,
    #[serde(default)]
    pub fingerprint_short: Option<String>,
    pub has_valid_subscription: bool,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    pub can_proceed: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// 激活冲突
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// 该指纹当前绑定在另一个展台上，继续会解除旧绑定
    FingerprintBoundElsewhere {
        booth_id: String,
        #[serde(default)]
        booth_name: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// 目标展台已有其他设备产生的数据，继续会清除旧关联
    BoothHasOtherDeviceData {
        #[serde(default)]
        transaction_count: u64,
        #[serde(default)]
        previous_hardware_id: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl Conflict {
    /// 展示给用户的说明
    pub fn describe(&self) -> String {
        match self {
            Conflict::FingerprintBoundElsewhere {
                booth_id,
                booth_name,
                message,
            } => message.clone().unwrap_or_else(|| {
                format!(
                    "该设备当前绑定在展台「{}」，继续将解除原有绑定",
                    booth_name.as_deref().unwrap_or(booth_id)
                )
            }),
            Conflict::BoothHasOtherDeviceData {
                transaction_count,
                previous_hardware_id,
                message,
            } => message.clone().unwrap_or_else(|| match previous_hardware_id {
                Some(hw) => format!(
                    "目标展台已有另一台设备（{}）的 {} 条交易记录，继续将清除原有关联",
                    hw, transaction_count
                ),
                None => format!(
                    "目标展台已有另一台设备的 {} 条交易记录，继续将清除原有关联",
                    transaction_count
                ),
            }),
        }
    }
}

/// 冲突确认
///
/// 两个确认标志在协议上必须同时为 true 或同时为 false，
/// 因此建模为单个值而不是两个布尔。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictConfirmation {
    #[default]
    NotRequired,
    Confirmed,
}

impl ConflictConfirmation {
    pub fn is_confirmed(self) -> bool {
        matches!(self, ConflictConfirmation::Confirmed)
    }
}

/// POST /licensing/activate-booth 请求
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationRequest {
    pub fingerprint: Fingerprint,
    /// `None` 为旧版寻址模式，由服务端根据历史绑定推断目标展台
    pub booth_id: Option<String>,
    pub confirmation: ConflictConfirmation,
}

impl ActivationRequest {
    /// 指定展台激活
    pub fn for_booth(
        fingerprint: Fingerprint,
        booth_id: impl Into<String>,
        confirmation: ConflictConfirmation,
    ) -> Self {
        Self {
            fingerprint,
            booth_id: Some(booth_id.into()),
            confirmation,
        }
    }

    /// 旧版寻址模式，仅用于兼容已安装的旧设备
    pub fn legacy(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            booth_id: None,
            confirmation: ConflictConfirmation::NotRequired,
        }
    }

    pub(crate) fn body(&self) -> ActivateBody<'_> {
        let confirmed = self.confirmation.is_confirmed();
        ActivateBody {
            fingerprint: &self.fingerprint,
            booth_id: self.booth_id.as_deref(),
            confirm_clear_booth_data: confirmed,
            confirm_switch_fingerprint: confirmed,
        }
    }
}

/// 激活请求的线上格式
#[derive(Debug, Serialize)]
pub(crate) struct ActivateBody<'a> {
    pub fingerprint: &'a Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booth_id: Option<&'a str>,
    pub confirm_clear_booth_data: bool,
    pub confirm_switch_fingerprint: bool,
}

/// 云同步配置（激活成功后写入设备）
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudSyncConfig {
    #[serde(default)]
    pub enabled: bool,
    pub booth_id: String,
    pub api_key: String,
    pub sync_endpoint: String,
    pub owner_id: String,
}

// api_key 不进入日志
impl fmt::Debug for CloudSyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudSyncConfig")
            .field("enabled", &self.enabled)
            .field("booth_id", &self.booth_id)
            .field("api_key", &"***")
            .field("sync_endpoint", &self.sync_endpoint)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

/// 激活错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationErrorCode {
    InvalidQr,
    BoothNotReady,
    SessionExpired,
    NoSubscription,
    FingerprintBoundElsewhere,
    BoothHasOtherData,
    BoothNotFound,
}

/// 激活失败后提供给用户的恢复路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// 使用同一展台重试（重新预检）
    RetrySameBooth,
    /// 返回展台选择
    ChooseAnotherBooth,
    /// 凭据丢失，需要走“重新生成许可证”流程
    RegenerateLicense,
    /// 只能离开激活流程
    Leave,
}

impl ActivationErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationErrorCode::InvalidQr => "INVALID_QR",
            ActivationErrorCode::BoothNotReady => "BOOTH_NOT_READY",
            ActivationErrorCode::SessionExpired => "SESSION_EXPIRED",
            ActivationErrorCode::NoSubscription => "NO_SUBSCRIPTION",
            ActivationErrorCode::FingerprintBoundElsewhere => "FINGERPRINT_BOUND_ELSEWHERE",
            ActivationErrorCode::BoothHasOtherData => "BOOTH_HAS_OTHER_DATA",
            ActivationErrorCode::BoothNotFound => "BOOTH_NOT_FOUND",
        }
    }

    /// 错误码到恢复路径的映射，新增错误码时必须在这里显式处理
    pub fn recovery(&self) -> Recovery {
        match self {
            ActivationErrorCode::SessionExpired | ActivationErrorCode::BoothNotReady => {
                Recovery::RetrySameBooth
            }
            ActivationErrorCode::BoothNotFound | ActivationErrorCode::NoSubscription => {
                Recovery::ChooseAnotherBooth
            }
            // 重新预检会再次列出冲突并要求确认
            ActivationErrorCode::FingerprintBoundElsewhere
            | ActivationErrorCode::BoothHasOtherData => Recovery::RetrySameBooth,
            ActivationErrorCode::InvalidQr => Recovery::Leave,
        }
    }

    /// 服务端未给出说明时的默认提示
    pub fn default_message(&self) -> &'static str {
        match self {
            ActivationErrorCode::InvalidQr => "二维码无效，请在展台上重新生成二维码",
            ActivationErrorCode::BoothNotReady => "展台尚未就绪，请稍后重试",
            ActivationErrorCode::SessionExpired => "激活会话已过期，请重试",
            ActivationErrorCode::NoSubscription => "该展台没有有效订阅，请选择其他展台或先订阅",
            ActivationErrorCode::FingerprintBoundElsewhere => {
                "该设备已绑定到其他展台，请重新确认后再激活"
            }
            ActivationErrorCode::BoothHasOtherData => {
                "目标展台已有其他设备的数据，请重新确认后再激活"
            }
            ActivationErrorCode::BoothNotFound => "展台不存在，请选择其他展台",
        }
    }
}

impl fmt::Display for ActivationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// POST /licensing/activate-booth 响应（线上格式）
#[derive(Debug, Deserialize)]
pub(crate) struct ActivateResponse {
    pub success: bool,
    #[serde(default)]
    pub fingerprint_short: Option<String>,
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default)]
    pub cloud_sync: Option<CloudSyncConfig>,
    #[serde(default)]
    pub error_code: Option<ActivationErrorCode>,
    #[serde(default)]
    pub message: Option<String>,
}

/// 激活成功的载荷，只返回一次，必须在会话结束前持久化
#[derive(Clone, PartialEq)]
pub struct ActivationSuccess {
    pub fingerprint_short: Option<String>,
    pub license_key: String,
    pub cloud_sync: Option<CloudSyncConfig>,
    pub message: Option<String>,
}

impl fmt::Debug for ActivationSuccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationSuccess")
            .field("fingerprint_short", &self.fingerprint_short)
            .field("license_key", &"***")
            .field("cloud_sync", &self.cloud_sync)
            .finish()
    }
}

/// 激活结果：业务失败是值而不是错误
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationResult {
    Activated(ActivationSuccess),
    Failed {
        code: ActivationErrorCode,
        message: String,
    },
}

impl TryFrom<ActivateResponse> for ActivationResult {
    type Error = ClientError;

    fn try_from(resp: ActivateResponse) -> Result<Self, Self::Error> {
        if resp.success {
            let license_key = resp
                .license_key
                .filter(|k| !k.is_empty())
                .ok_or_else(|| ClientError::Decode("激活成功但缺少 license_key".to_string()))?;
            return Ok(ActivationResult::Activated(ActivationSuccess {
                fingerprint_short: resp.fingerprint_short,
                license_key,
                cloud_sync: resp.cloud_sync,
                message: resp.message,
            }));
        }

        let code = resp
            .error_code
            .ok_or_else(|| ClientError::Decode("激活失败但缺少 error_code".to_string()))?;
        Ok(ActivationResult::Failed {
            code,
            message: resp
                .message
                .unwrap_or_else(|| code.default_message().to_string()),
        })
    }
}

/// POST /licensing/regenerate 请求体
#[derive(Debug, Serialize)]
pub(crate) struct RegenerateRequest<'a> {
    pub booth_id: &'a str,
}

/// POST /licensing/regenerate 响应
#[derive(Debug, Deserialize)]
pub(crate) struct RegenerateResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// 交给安全存储的激活凭据
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCredentials {
    pub booth_id: String,
    #[serde(default)]
    pub booth_name: Option<String>,
    #[serde(default)]
    pub fingerprint_short: Option<String>,
    pub license_key: String,
    #[serde(default)]
    pub cloud_sync: Option<CloudSyncConfig>,
    pub issued_at: DateTime<Utc>,
}

impl IssuedCredentials {
    pub fn new(booth_id: &str, booth_name: Option<String>, success: &ActivationSuccess) -> Self {
        Self {
            booth_id: booth_id.to_string(),
            booth_name,
            fingerprint_short: success.fingerprint_short.clone(),
            license_key: success.license_key.clone(),
            cloud_sync: success.cloud_sync.clone(),
            issued_at: Utc::now(),
        }
    }
}

impl fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("booth_id", &self.booth_id)
            .field("booth_name", &self.booth_name)
            .field("fingerprint_short", &self.fingerprint_short)
            .field("license_key", &"***")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
