use std::sync::Arc;

use crate::store::SelectionStore;

/// 激活流程的展台选择上下文
///
/// 由宿主在构造会话时传入：可选的预选展台（例如从设置页跳转过来）
/// 和读写持久化选择的能力。
#[derive(Clone)]
pub struct ActivationContext {
    preselected_booth_id: Option<String>,
    selection: Arc<dyn SelectionStore>,
}

impl ActivationContext {
    pub fn new(selection: Arc<dyn SelectionStore>) -> Self {
        Self {
            preselected_booth_id: None,
            selection,
        }
    }

    /// 预选展台，扫码后跳过展台选择直接预检
    pub fn with_preselected_booth(mut self, booth_id: impl Into<String>) -> Self {
        self.preselected_booth_id = Some(booth_id.into());
        self
    }

    pub fn preselected_booth_id(&self) -> Option<&str> {
        self.preselected_booth_id.as_deref()
    }

    pub(crate) fn clear_preselection(&mut self) {
        self.preselected_booth_id = None;
    }

    pub(crate) fn selection(&self) -> &Arc<dyn SelectionStore> {
        &self.selection
    }
}

impl std::fmt::Debug for ActivationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationContext")
            .field("preselected_booth_id", &self.preselected_booth_id)
            .finish_non_exhaustive()
    }
}
