use std::fmt;

use crate::error::ClientError;

use crate::models::{
    ActivationErrorCode, ActivationSuccess, BoothSubscription, ConflictConfirmation,
    PreCheckResult, Recovery,
};

/// 扫码会话状态
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    /// 相机已打开，等待解码
    Scanning,
    /// 二维码格式错误，等待用户确认后重新扫描
    InvalidQr { message: String },
    /// 正在加载展台列表
    LoadingBooths,
    SelectingBooth {
        booths: Vec<BoothSubscription>,
        /// 上次选中的展台（仅用于高亮）
        current: Option<String>,
    },
    PreChecking { booth_id: String },
    /// 等待用户一次性确认全部冲突
    ConfirmingConflicts { pre_check: PreCheckResult },
    Activating {
        booth_id: String,
        confirmation: ConflictConfirmation,
    },
    Succeeded {
        booth_id: String,
        booth_name: Option<String>,
        success: ActivationSuccess,
    },
    Failed(Failure),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Scanning => "Scanning",
            SessionState::InvalidQr { .. } => "InvalidQr",
            SessionState::LoadingBooths => "LoadingBooths",
            SessionState::SelectingBooth { .. } => "SelectingBooth",
            SessionState::PreChecking { .. } => "PreChecking",
            SessionState::ConfirmingConflicts { .. } => "ConfirmingConflicts",
            SessionState::Activating { .. } => "Activating",
            SessionState::Succeeded { .. } => "Succeeded",
            SessionState::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded { .. } | SessionState::Failed(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 网络请求所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ListBooths,
    PreCheck,
    Activate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// 预检 `can_proceed = false`
    SubscriptionRequired,
    /// 激活接口返回的业务错误
    Activation(ActivationErrorCode),
    /// 网络或服务端错误，用户可选择重试或取消
    Transport(Stage),
    /// 激活成功但凭据未能保存
    CredentialStorage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub recovery: Recovery,
}

impl Failure {
    pub(crate) fn subscription_required(message: String) -> Self {
        Self {
            kind: FailureKind::SubscriptionRequired,
            message,
            recovery: Recovery::ChooseAnotherBooth,
        }
    }

    pub(crate) fn activation(code: ActivationErrorCode, message: String) -> Self {
        Self {
            kind: FailureKind::Activation(code),
            message,
            recovery: code.recovery(),
        }
    }

    /// 只有可重试的错误才提供重试，认证或配置错误重试也不会成功
    pub(crate) fn transport(stage: Stage, err: &ClientError) -> Self {
        Self {
            kind: FailureKind::Transport(stage),
            message: err.to_string(),
            recovery: if err.is_retryable() {
                Recovery::RetrySameBooth
            } else {
                Recovery::Leave
            },
        }
    }

    pub(crate) fn credential_storage(message: String) -> Self {
        Self {
            kind: FailureKind::CredentialStorage,
            message,
            recovery: Recovery::RegenerateLicense,
        }
    }
}

/// 解码事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// 已开始处理（之后的状态见 [`SessionState`]）
    Accepted,
    /// 已有扫码在处理中，本次解码被忽略
    Ignored,
}
