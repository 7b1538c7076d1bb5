use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct CancelState {
    epoch: AtomicU64,
    notify: Notify,
}

impl CancelState {
    pub(crate) fn current(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// 运行请求；期间若发生取消则丢弃结果并返回 `None`
    pub(crate) async fn run<F: Future>(&self, seen: u64, fut: F) -> Option<F::Output> {
        // 先注册等待，再检查 epoch，避免漏掉两者之间的取消
        let notified = self.notify.notified();
        tokio::pin!(notified);
        if self.current() != seen {
            return None;
        }

        tokio::select! {
            out = fut => (self.current() == seen).then_some(out),
            _ = &mut notified => None,
        }
    }
}

/// 会话句柄，可在请求进行中从其他任务取消会话
///
/// 用户离开激活页面时由宿主调用，进行中的预检或激活结果会被丢弃，
/// 会话回到 `Idle`。
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub(crate) state: Arc<CancelState>,
}

impl SessionHandle {
    pub fn cancel(&self) {
        self.state.cancel();
    }
}
