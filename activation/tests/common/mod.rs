#![allow(dead_code)]

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use boothfleet_activation::api::{BoothApi, RegeneratedLicense};
use boothfleet_activation::models::{
    ActivationErrorCode, ActivationRequest, ActivationResult, ActivationSuccess,
    BoothSubscription, CloudSyncConfig, Conflict, IssuedCredentials, PreCheckResult,
    SubscriptionStatus,
};
use boothfleet_activation::session::ActivationContext;
use boothfleet_activation::store::{CredentialStore, MemoryCredentialStore, MemorySelectionStore};
use boothfleet_activation::{ClientError, Fingerprint, Result, ScanSession};

pub const FP: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

pub fn booth(id: &str, name: &str, status: SubscriptionStatus) -> BoothSubscription {
    BoothSubscription {
        booth_id: id.to_string(),
        booth_name: name.to_string(),
        status,
        plan_name: None,
        current_period_end: None,
    }
}

pub fn pre_check(booth_id: &str, can_proceed: bool, conflicts: Vec<Conflict>) -> PreCheckResult {
    PreCheckResult {
        booth_id: booth_id.to_string(),
        booth_name: Some(format!("Booth {booth_id}")),
        fingerprint_short: Some("AAAAAAAA...AAAAAAAA".to_string()),
        has_valid_subscription: can_proceed,
        conflicts,
        can_proceed,
        message: None,
    }
}

pub fn bound_elsewhere(previous: &str) -> Conflict {
    Conflict::FingerprintBoundElsewhere {
        booth_id: previous.to_string(),
        booth_name: Some("Old booth".to_string()),
        message: None,
    }
}

pub fn success(license_key: &str) -> ActivationResult {
    ActivationResult::Activated(ActivationSuccess {
        fingerprint_short: Some("AAAAAAAA...AAAAAAAA".to_string()),
        license_key: license_key.to_string(),
        cloud_sync: Some(CloudSyncConfig {
            enabled: true,
            booth_id: "B1".to_string(),
            api_key: "ak".to_string(),
            sync_endpoint: "https://sync.example.com".to_string(),
            owner_id: "owner-1".to_string(),
        }),
        message: None,
    })
}

pub fn failure(code: ActivationErrorCode) -> ActivationResult {
    ActivationResult::Failed {
        code,
        message: code.default_message().to_string(),
    }
}

pub fn transport_error() -> ClientError {
    ClientError::Http {
        status: StatusCode::BAD_GATEWAY,
        message: "bad gateway".to_string(),
    }
}

/// 记录调用的假后端
#[derive(Default)]
pub struct FakeApi {
    pub booths: Mutex<Vec<BoothSubscription>>,
    pub pre_checks: Mutex<VecDeque<Result<PreCheckResult>>>,
    pub activations: Mutex<VecDeque<Result<ActivationResult>>>,
    pub list_calls: AtomicUsize,
    pub pre_check_calls: Mutex<Vec<(String, String)>>,
    pub activate_calls: Mutex<Vec<ActivationRequest>>,
    /// 置位后预检请求永不返回，用于测试取消
    pub hang_pre_check: AtomicBool,
    pub pre_check_started: Notify,
}

impl FakeApi {
    pub fn new(booths: Vec<BoothSubscription>) -> Arc<Self> {
        let api = Self::default();
        *api.booths.lock().unwrap() = booths;
        Arc::new(api)
    }

    pub fn push_pre_check(&self, result: Result<PreCheckResult>) {
        self.pre_checks.lock().unwrap().push_back(result);
    }

    pub fn push_activation(&self, result: Result<ActivationResult>) {
        self.activations.lock().unwrap().push_back(result);
    }

    pub fn pre_check_count(&self) -> usize {
        self.pre_check_calls.lock().unwrap().len()
    }

    pub fn activate_count(&self) -> usize {
        self.activate_calls.lock().unwrap().len()
    }

    pub fn last_activation(&self) -> ActivationRequest {
        self.activate_calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("activate was never called")
    }
}

#[async_trait]
impl BoothApi for FakeApi {
    async fn list_booths(&self) -> Result<Vec<BoothSubscription>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.booths.lock().unwrap().clone())
    }

    async fn pre_check(&self, fingerprint: &Fingerprint, booth_id: &str) -> Result<PreCheckResult> {
        self.pre_check_calls
            .lock()
            .unwrap()
            .push((fingerprint.as_str().to_string(), booth_id.to_string()));
        self.pre_check_started.notify_one();
        if self.hang_pre_check.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.pre_checks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(pre_check(booth_id, true, vec![])))
    }

    async fn activate(&self, request: &ActivationRequest) -> Result<ActivationResult> {
        self.activate_calls.lock().unwrap().push(request.clone());
        self.activations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(success("LK-DEFAULT")))
    }

    async fn regenerate_license(&self, booth_id: &str) -> Result<RegeneratedLicense> {
        Ok(RegeneratedLicense {
            booth_id: booth_id.to_string(),
            license_key: "LK-REGEN".to_string(),
            message: None,
        })
    }
}

/// 总是写入失败的凭据存储
pub struct BrokenCredentialStore;

#[async_trait]
impl CredentialStore for BrokenCredentialStore {
    async fn save(&self, _credentials: &IssuedCredentials) -> Result<()> {
        Err(ClientError::Store("disk full".to_string()))
    }

    async fn load(&self, _booth_id: &str) -> Result<Option<IssuedCredentials>> {
        Ok(None)
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub selection: Arc<MemorySelectionStore>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub session: ScanSession,
}

pub fn harness(api: Arc<FakeApi>, preselected: Option<&str>) -> Harness {
    let selection = Arc::new(MemorySelectionStore::default());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let mut context = ActivationContext::new(selection.clone());
    if let Some(booth_id) = preselected {
        context = context.with_preselected_booth(booth_id);
    }
    let session = ScanSession::new(api.clone(), context, credentials.clone());
    Harness {
        api,
        selection,
        credentials,
        session,
    }
}

pub fn default_booths() -> Vec<BoothSubscription> {
    vec![
        booth("B1", "Lobby", SubscriptionStatus::Active),
        booth("B2", "Mall", SubscriptionStatus::Canceled),
        booth("B3", "Pier", SubscriptionStatus::Trialing),
    ]
}
