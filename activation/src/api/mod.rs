//! 后端接口
//!
//! [`BoothApi`] 是激活流程与后端之间的接缝，[`ApiClient`] 是基于
//! reqwest 的实现；测试中可以替换为记录调用的假实现。

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::models::{ActivationRequest, ActivationResult, BoothSubscription, PreCheckResult};

pub mod client;
pub mod licensing;

pub use client::ApiClient;
pub use licensing::RegeneratedLicense;

#[async_trait]
pub trait BoothApi: Send + Sync {
    /// 当前账号的展台订阅列表（展台选择的数据源）
    async fn list_booths(&self) -> Result<Vec<BoothSubscription>>;

    /// 只读预检：报告冲突和订阅状态，不修改服务端数据
    async fn pre_check(&self, fingerprint: &Fingerprint, booth_id: &str) -> Result<PreCheckResult>;

    /// 执行绑定。业务失败以 [`ActivationResult::Failed`] 返回，
    /// 只有传输层失败才是 `Err`
    async fn activate(&self, request: &ActivationRequest) -> Result<ActivationResult>;

    /// 许可证丢失时重新生成，旧许可证随即失效
    async fn regenerate_license(&self, booth_id: &str) -> Result<RegeneratedLicense>;
}
