//! 冲突决策
//!
//! 预检返回后立即求值，结果只取决于预检内容：
//! 1. 无有效订阅：终止，不调用激活接口
//! 2. 有冲突：一次性列出全部冲突，用户确认一次即覆盖全部
//! 3. 无冲突：直接激活，确认标志保持未设置

use crate::models::{Conflict, ConflictConfirmation, PreCheckResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// 目标展台没有有效订阅，不能激活
    SubscriptionRequired { message: String },
    /// 需要用户确认全部冲突
    ConfirmConflicts(Vec<Conflict>),
    /// 直接激活
    Proceed(ConflictConfirmation),
}

pub fn resolve(result: &PreCheckResult) -> Resolution {
    if !result.can_proceed {
        return Resolution::SubscriptionRequired {
            message: result.message.clone().unwrap_or_else(|| {
                format!(
                    "展台「{}」没有有效订阅，请先订阅后再激活",
                    result.booth_name.as_deref().unwrap_or(&result.booth_id)
                )
            }),
        };
    }

    if !result.conflicts.is_empty() {
        return Resolution::ConfirmConflicts(result.conflicts.clone());
    }

    Resolution::Proceed(ConflictConfirmation::NotRequired)
}
