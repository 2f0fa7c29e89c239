//! 进度回调与取消

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 进度接收者（纯观察，不影响导入结果）
pub trait ProgressSink {
    fn report(&mut self, percent: u8, stage: &str);
}

/// 写日志
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, percent: u8, stage: &str) {
        log::info!("[导入] {:>3}% {}", percent, stage);
    }
}

/// 忽略进度
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8, _stage: &str) {}
}

impl<F: FnMut(u8, &str)> ProgressSink for F {
    fn report(&mut self, percent: u8, stage: &str) {
        self(percent, stage)
    }
}

/// 协作式取消标记（在阶段边界检查）
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
