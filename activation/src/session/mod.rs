//! 扫码激活会话
//!
//! 一次相机会话的完整流程：
//! 扫码 → 校验 → （选择展台）→ 预检 → （确认冲突）→ 激活 → 结果
//!
//! 会话是单线程、事件驱动的：宿主把解码事件和用户操作依次交给
//! [`ScanSession`]，每个方法返回后通过 [`ScanSession::state`] 渲染界面。
//! 同一时间只处理一次扫码，重复解码由同步标志直接忽略。

mod cancel;
mod context;
mod state;

pub use cancel::SessionHandle;
pub use context::ActivationContext;
pub use state::{DecodeOutcome, Failure, FailureKind, SessionState, Stage};

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::BoothApi;
use crate::fingerprint::Fingerprint;
use crate::models::{
    ActivationRequest, ActivationResult, BoothSubscription, ConflictConfirmation,
    IssuedCredentials, Recovery,
};
use crate::resolver::{resolve, Resolution};
use crate::store::CredentialStore;
use cancel::CancelState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("当前状态 {state} 下不能执行 {action}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("展台 {0} 不在当前账号的展台列表中")]
    UnknownBooth(String),

    /// 请求进行中会话被取消，结果已丢弃
    #[error("激活会话已取消")]
    Cancelled,
}

pub type Transition = Result<(), SessionError>;

/// 单次激活尝试的临时数据，重置时整体丢弃
#[derive(Debug)]
struct Attempt {
    fingerprint: Fingerprint,
    booth_id: Option<String>,
    booth_name: Option<String>,
    booths: Option<Vec<BoothSubscription>>,
}

impl Attempt {
    fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            booth_id: None,
            booth_name: None,
            booths: None,
        }
    }

    fn clear_booth(&mut self) {
        self.booth_id = None;
        self.booth_name = None;
    }
}

/// 扫码激活会话控制器
pub struct ScanSession {
    api: Arc<dyn BoothApi>,
    context: ActivationContext,
    credentials: Arc<dyn CredentialStore>,
    state: SessionState,
    attempt: Option<Attempt>,
    /// 重复扫码保护：首次解码时同步置位，只在完整重置时清除
    scan_locked: bool,
    cancel: Arc<CancelState>,
    seen_epoch: u64,
    session_id: Uuid,
}

impl ScanSession {
    pub fn new(
        api: Arc<dyn BoothApi>,
        context: ActivationContext,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let cancel = Arc::new(CancelState::default());
        let seen_epoch = cancel.current();
        Self {
            api,
            context,
            credentials,
            state: SessionState::Idle,
            attempt: None,
            scan_locked: false,
            cancel,
            seen_epoch,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.cancel.clone(),
        }
    }

    pub fn context(&self) -> &ActivationContext {
        &self.context
    }

    /// 当前扫描到的指纹短标签
    pub fn fingerprint_label(&self) -> Option<String> {
        self.attempt.as_ref().map(|a| a.fingerprint.short_label())
    }

    /// 当前选中的展台
    pub fn selected_booth_id(&self) -> Option<&str> {
        self.attempt.as_ref().and_then(|a| a.booth_id.as_deref())
    }

    pub fn is_scan_locked(&self) -> bool {
        self.scan_locked
    }

    /// 打开相机
    pub fn start(&mut self) -> Transition {
        self.sync_epoch();
        match self.state {
            SessionState::Idle => {
                self.transition(SessionState::Scanning);
                Ok(())
            }
            SessionState::Scanning => Ok(()),
            _ => Err(self.invalid("start")),
        }
    }

    /// 处理一次二维码解码事件
    pub async fn on_decode(&mut self, raw: &str) -> Result<DecodeOutcome, SessionError> {
        self.sync_epoch();

        // 在任何异步操作之前检查并置位
        if self.scan_locked
            || !matches!(self.state, SessionState::Idle | SessionState::Scanning)
        {
            debug!(
                "[ScanSession] 忽略重复扫码: session={}, state={}",
                self.session_id, self.state
            );
            return Ok(DecodeOutcome::Ignored);
        }
        self.scan_locked = true;

        let fingerprint = match Fingerprint::parse(raw) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(
                    "[ScanSession] 二维码格式无效: session={}, len={}",
                    self.session_id,
                    raw.len()
                );
                self.transition(SessionState::InvalidQr {
                    message: e.to_string(),
                });
                return Ok(DecodeOutcome::Accepted);
            }
        };

        info!(
            "[ScanSession] 扫描到设备指纹: session={}, fingerprint={}",
            self.session_id,
            fingerprint.short_label()
        );
        self.attempt = Some(Attempt::new(fingerprint));

        match self.context.preselected_booth_id().map(str::to_string) {
            Some(booth_id) => {
                debug!("[ScanSession] 使用预选展台: {}", booth_id);
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.booth_id = Some(booth_id.clone());
                }
                self.run_pre_check(booth_id).await?;
            }
            None => self.open_booth_selection().await?,
        }
        Ok(DecodeOutcome::Accepted)
    }

    /// 确认二维码无效提示，重新开始扫描
    pub fn acknowledge_invalid(&mut self) -> Transition {
        self.sync_epoch();
        match self.state {
            SessionState::InvalidQr { .. } => {
                self.attempt = None;
                self.scan_locked = false;
                self.transition(SessionState::Scanning);
                Ok(())
            }
            _ => Err(self.invalid("acknowledge_invalid")),
        }
    }

    /// 用户选择目标展台，随即预检
    pub async fn select_booth(&mut self, booth_id: &str) -> Transition {
        self.sync_epoch();
        let booth = match &self.state {
            SessionState::SelectingBooth { booths, .. } => booths
                .iter()
                .find(|b| b.booth_id == booth_id)
                .cloned()
                .ok_or_else(|| SessionError::UnknownBooth(booth_id.to_string()))?,
            _ => return Err(self.invalid("select_booth")),
        };

        info!(
            "[ScanSession] 选择展台: session={}, booth={} ({})",
            self.session_id, booth.booth_id, booth.booth_name
        );
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.booth_id = Some(booth.booth_id.clone());
            attempt.booth_name = Some(booth.booth_name.clone());
        }
        self.run_pre_check(booth.booth_id).await
    }

    /// 用户确认全部冲突，继续激活
    pub async fn confirm_conflicts(&mut self) -> Transition {
        self.sync_epoch();
        match self.state {
            SessionState::ConfirmingConflicts { .. } => {
                info!("[ScanSession] 用户确认冲突: session={}", self.session_id);
                self.run_activation(ConflictConfirmation::Confirmed).await
            }
            _ => Err(self.invalid("confirm_conflicts")),
        }
    }

    /// 用户取消冲突确认：清除选中展台，回到展台选择，需要重新预检
    pub async fn decline_conflicts(&mut self) -> Transition {
        self.sync_epoch();
        match self.state {
            SessionState::ConfirmingConflicts { .. } => {
                info!("[ScanSession] 用户取消冲突确认: session={}", self.session_id);
                self.back_to_booth_selection().await
            }
            _ => Err(self.invalid("decline_conflicts")),
        }
    }

    /// 用户在失败后选择重试
    pub async fn retry(&mut self) -> Transition {
        self.sync_epoch();
        let failure = match &self.state {
            SessionState::Failed(failure) => failure.clone(),
            _ => return Err(self.invalid("retry")),
        };

        match (failure.kind, failure.recovery) {
            (_, Recovery::ChooseAnotherBooth | Recovery::RegenerateLicense | Recovery::Leave) => {
                Err(self.invalid("retry"))
            }
            (FailureKind::Transport(Stage::ListBooths), Recovery::RetrySameBooth) => {
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.booths = None;
                }
                self.open_booth_selection().await
            }
            (_, Recovery::RetrySameBooth) => match self.selected_booth_id().map(str::to_string) {
                Some(booth_id) => self.run_pre_check(booth_id).await,
                None => self.open_booth_selection().await,
            },
        }
    }

    /// 失败后返回展台选择
    pub async fn choose_another_booth(&mut self) -> Transition {
        self.sync_epoch();
        let allowed = self.attempt.is_some()
            && matches!(
                &self.state,
                SessionState::Failed(failure)
                    if matches!(failure.recovery, Recovery::ChooseAnotherBooth | Recovery::RetrySameBooth)
            );
        if allowed {
            self.back_to_booth_selection().await
        } else {
            Err(self.invalid("choose_another_booth"))
        }
    }

    /// 确认最终结果（成功或失败），会话完整重置
    pub fn acknowledge(&mut self) -> Transition {
        self.sync_epoch();
        if self.state.is_terminal() {
            self.reset();
            Ok(())
        } else {
            Err(self.invalid("acknowledge"))
        }
    }

    /// 取消会话，可在任意状态调用，重复调用无副作用
    pub fn cancel(&mut self) {
        if !matches!(self.state, SessionState::Idle) || self.attempt.is_some() {
            info!(
                "[ScanSession] 会话取消: session={}, state={}",
                self.session_id, self.state
            );
        }
        self.reset();
    }

    /// 宿主离开激活页面时调用
    pub fn dispose(mut self) {
        self.cancel();
    }

    async fn back_to_booth_selection(&mut self) -> Transition {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.clear_booth();
        }
        self.context.clear_preselection();
        self.open_booth_selection().await
    }

    async fn open_booth_selection(&mut self) -> Transition {
        let cached = self.attempt.as_ref().and_then(|a| a.booths.clone());
        let booths = match cached {
            Some(booths) => booths,
            None => {
                self.transition(SessionState::LoadingBooths);
                let api = self.api.clone();
                let cancel = self.cancel.clone();
                match cancel.run(self.seen_epoch, api.list_booths()).await {
                    None => return Err(self.cancelled()),
                    Some(Err(e)) => {
                        error!("[ScanSession] 获取展台列表失败: {}", e);
                        self.transition(SessionState::Failed(Failure::transport(
                            Stage::ListBooths,
                            &e,
                        )));
                        return Ok(());
                    }
                    Some(Ok(booths)) => {
                        if let Some(attempt) = self.attempt.as_mut() {
                            attempt.booths = Some(booths.clone());
                        }
                        booths
                    }
                }
            }
        };

        let current = match self.context.selection().load().await {
            Ok(current) => current,
            Err(e) => {
                warn!("[ScanSession] 读取选中展台失败: {}", e);
                None
            }
        };

        self.transition(SessionState::SelectingBooth { booths, current });
        Ok(())
    }

    async fn run_pre_check(&mut self, booth_id: String) -> Transition {
        let Some(fingerprint) = self.attempt.as_ref().map(|a| a.fingerprint.clone()) else {
            return Err(self.invalid("pre_check"));
        };

        self.transition(SessionState::PreChecking {
            booth_id: booth_id.clone(),
        });
        let api = self.api.clone();
        let cancel = self.cancel.clone();
        let result = match cancel
            .run(self.seen_epoch, api.pre_check(&fingerprint, &booth_id))
            .await
        {
            None => return Err(self.cancelled()),
            Some(Err(e)) => {
                error!("[ScanSession] 预检失败: booth={}, {}", booth_id, e);
                self.transition(SessionState::Failed(Failure::transport(
                    Stage::PreCheck,
                    &e,
                )));
                return Ok(());
            }
            Some(Ok(result)) => result,
        };

        if let Some(attempt) = self.attempt.as_mut() {
            if result.booth_name.is_some() {
                attempt.booth_name = result.booth_name.clone();
            }
        }

        match resolve(&result) {
            Resolution::SubscriptionRequired { message } => {
                warn!(
                    "[ScanSession] 展台没有有效订阅: session={}, booth={}",
                    self.session_id, booth_id
                );
                self.transition(SessionState::Failed(Failure::subscription_required(message)));
                Ok(())
            }
            Resolution::ConfirmConflicts(conflicts) => {
                info!(
                    "[ScanSession] 检测到 {} 个冲突，等待用户确认: booth={}",
                    conflicts.len(),
                    booth_id
                );
                self.transition(SessionState::ConfirmingConflicts { pre_check: result });
                Ok(())
            }
            Resolution::Proceed(confirmation) => self.run_activation(confirmation).await,
        }
    }

    async fn run_activation(&mut self, confirmation: ConflictConfirmation) -> Transition {
        let Some((fingerprint, booth_id, booth_name)) = self.attempt.as_ref().and_then(|a| {
            a.booth_id
                .clone()
                .map(|id| (a.fingerprint.clone(), id, a.booth_name.clone()))
        }) else {
            return Err(self.invalid("activate"));
        };

        self.transition(SessionState::Activating {
            booth_id: booth_id.clone(),
            confirmation,
        });
        let request = ActivationRequest::for_booth(fingerprint, booth_id.clone(), confirmation);
        let api = self.api.clone();
        let cancel = self.cancel.clone();
        let result = match cancel.run(self.seen_epoch, api.activate(&request)).await {
            None => return Err(self.cancelled()),
            Some(Err(e)) => {
                error!("[ScanSession] 激活请求失败: booth={}, {}", booth_id, e);
                self.transition(SessionState::Failed(Failure::transport(
                    Stage::Activate,
                    &e,
                )));
                return Ok(());
            }
            Some(Ok(result)) => result,
        };

        let success = match result {
            ActivationResult::Failed { code, message } => {
                warn!(
                    "[ScanSession] 激活失败: session={}, booth={}, code={}",
                    self.session_id, booth_id, code
                );
                self.transition(SessionState::Failed(Failure::activation(code, message)));
                return Ok(());
            }
            ActivationResult::Activated(success) => success,
        };

        // 凭据只返回一次，必须在进入成功状态之前落盘；
        // 选中展台也只在激活成功后写入，流程中途不修改任何外部状态
        let issued = IssuedCredentials::new(&booth_id, booth_name.clone(), &success);
        if let Err(e) = self.credentials.save(&issued).await {
            error!(
                "[ScanSession] 激活成功但凭据保存失败: booth={}, {}",
                booth_id, e
            );
            self.transition(SessionState::Failed(Failure::credential_storage(format!(
                "激活成功，但许可证未能保存：{}。请使用“重新生成许可证”恢复",
                e
            ))));
            return Ok(());
        }

        if let Err(e) = self.context.selection().save(Some(&booth_id)).await {
            warn!("[ScanSession] 保存选中展台失败: {}", e);
        }

        info!(
            "[ScanSession] 激活完成: session={}, booth={}",
            self.session_id, booth_id
        );
        self.transition(SessionState::Succeeded {
            booth_id,
            booth_name,
            success,
        });
        Ok(())
    }

    /// 在两次调用之间收到的取消请求在这里生效
    fn sync_epoch(&mut self) {
        if self.cancel.current() != self.seen_epoch {
            info!(
                "[ScanSession] 收到取消请求，重置会话: session={}, state={}",
                self.session_id, self.state
            );
            self.reset();
        }
    }

    fn cancelled(&mut self) -> SessionError {
        info!(
            "[ScanSession] 请求进行中会话被取消，结果已丢弃: session={}, state={}",
            self.session_id, self.state
        );
        self.reset();
        SessionError::Cancelled
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.attempt = None;
        self.scan_locked = false;
        self.seen_epoch = self.cancel.current();
        self.session_id = Uuid::new_v4();
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            "[ScanSession] 状态切换: session={}, {} -> {}",
            self.session_id, self.state, next
        );
        self.state = next;
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("session_id", &self.session_id)
            .field("state", &self.state.name())
            .field("scan_locked", &self.scan_locked)
            .finish_non_exhaustive()
    }
}
