//! 展台激活接口
//!
//! 预检、激活、重新生成许可证以及展台订阅列表。

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info, warn};

use super::client::{decode_json, http_error, parse_error_body, ApiClient};
use super::BoothApi;
use crate::error::{ClientError, Result};
use crate::fingerprint::Fingerprint;
use crate::models::{
    ActivateResponse, ActivationRequest, ActivationResult, BoothSubscription,
    PreCheckRequest, PreCheckResult, RegenerateRequest, RegenerateResponse,
};

const PRE_CHECK_PATH: &str = "/licensing/activate-booth/pre-check";
const ACTIVATE_PATH: &str = "/licensing/activate-booth";
const REGENERATE_PATH: &str = "/licensing/regenerate";
const SUBSCRIPTIONS_PATH: &str = "/payments/subscriptions";

/// 重新生成的许可证
#[derive(Clone, PartialEq)]
pub struct RegeneratedLicense {
    pub booth_id: String,
    pub license_key: String,
    pub message: Option<String>,
}

impl std::fmt::Debug for RegeneratedLicense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegeneratedLicense")
            .field("booth_id", &self.booth_id)
            .field("license_key", &"***")
            .finish()
    }
}

#[async_trait]
impl BoothApi for ApiClient {
    async fn list_booths(&self) -> Result<Vec<BoothSubscription>> {
        let booths: Vec<BoothSubscription> = self.get_json(SUBSCRIPTIONS_PATH).await?;
        debug!("[Licensing] 获取到 {} 个展台订阅", booths.len());
        Ok(booths)
    }

    async fn pre_check(&self, fingerprint: &Fingerprint, booth_id: &str) -> Result<PreCheckResult> {
        info!(
            "[Licensing] 预检: fingerprint={}, booth={}",
            fingerprint.short_label(),
            booth_id
        );

        let result: PreCheckResult = self
            .post_json(PRE_CHECK_PATH, &PreCheckRequest { fingerprint, booth_id })
            .await?;

        info!(
            "[Licensing] 预检完成: booth={}, can_proceed={}, subscription={}, conflicts={}",
            result.booth_id,
            result.can_proceed,
            result.has_valid_subscription,
            result.conflicts.len()
        );
        Ok(result)
    }

    async fn activate(&self, request: &ActivationRequest) -> Result<ActivationResult> {
        info!(
            "[Licensing] 激活: fingerprint={}, booth={:?}, confirmed={}",
            request.fingerprint.short_label(),
            request.booth_id,
            request.confirmation.is_confirmed()
        );

        let response = self
            .send(Method::POST, ACTIVATE_PATH, Some(&request.body()))
            .await?;
        let status = response.status();

        let result = if status.is_success() {
            let body: ActivateResponse = decode_json(response).await?;
            ActivationResult::try_from(body)?
        } else {
            // 业务失败也可能以 4xx 返回，只要带有 error_code 就按业务结果处理
            let bytes = response.bytes().await?;
            if let Ok(body) = serde_json::from_slice::<ActivateResponse>(&bytes) {
                if body.error_code.is_some() && !body.success {
                    ActivationResult::try_from(body)?
                } else {
                    return Err(http_error(status, &parse_error_body(&bytes)));
                }
            } else {
                let body = parse_error_body(&bytes);
                match body.error_code {
                    Some(code) => ActivationResult::Failed {
                        code,
                        message: body
                            .text()
                            .map(str::to_string)
                            .unwrap_or_else(|| code.default_message().to_string()),
                    },
                    None => return Err(http_error(status, &body)),
                }
            }
        };

        match &result {
            ActivationResult::Activated(success) => info!(
                "[Licensing] 激活成功: fingerprint={:?}, cloud_sync={}",
                success.fingerprint_short,
                success.cloud_sync.is_some()
            ),
            ActivationResult::Failed { code, message } => {
                warn!("[Licensing] 激活失败: code={}, message={}", code, message)
            }
        }
        Ok(result)
    }

    async fn regenerate_license(&self, booth_id: &str) -> Result<RegeneratedLicense> {
        info!("[Licensing] 重新生成许可证: booth={}", booth_id);

        let body: RegenerateResponse = self
            .post_json(REGENERATE_PATH, &RegenerateRequest { booth_id })
            .await?;

        match (body.success, body.license_key) {
            (true, Some(license_key)) if !license_key.is_empty() => {
                info!("[Licensing] 许可证已重新生成: booth={}", booth_id);
                Ok(RegeneratedLicense {
                    booth_id: booth_id.to_string(),
                    license_key,
                    message: body.message,
                })
            }
            (true, _) => Err(ClientError::Decode(
                "重新生成成功但缺少 license_key".to_string(),
            )),
            (false, _) => {
                let message = body
                    .message
                    .unwrap_or_else(|| "重新生成许可证失败".to_string());
                warn!("[Licensing] 重新生成许可证被拒绝: booth={}, {}", booth_id, message);
                Err(ClientError::Rejected(message))
            }
        }
    }
}
