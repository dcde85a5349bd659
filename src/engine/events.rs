// ==========================================
// 会员名册导入查重引擎 - 进度通知与取消
// ==========================================
// 职责: 定义进度回调 trait 与跨任务取消标志
// 说明: 引擎只在块边界通知进度、检查取消
// ==========================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ==========================================
// 进度回调 Trait
// ==========================================

/// 批次进度接收者
///
/// # 实现说明
/// - 每处理完一块调用一次，processed 单调不减
/// - 闭包 `Fn(usize, usize)` 自动实现此 trait
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, processed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, processed: usize, total: usize) {
        self(processed, total)
    }
}

/// 空操作进度接收者
#[derive(Debug, Clone, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn on_progress(&self, processed: usize, total: usize) {
        tracing::trace!(processed, total, "NoOpProgressSink: 跳过进度通知");
    }
}

/// 以日志输出进度
#[derive(Debug, Clone, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, processed: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 * 100.0 / total as f64
        };
        tracing::info!(processed, total, percent = %format!("{:.1}", percent), "批次进度");
    }
}

/// 可选的进度接收者包装
///
/// 简化 Option<Arc<dyn ProgressSink>> 的使用
#[derive(Clone, Default)]
pub struct OptionalProgressSink {
    inner: Option<Arc<dyn ProgressSink>>,
}

impl OptionalProgressSink {
    pub fn with_sink(sink: Arc<dyn ProgressSink>) -> Self {
        Self { inner: Some(sink) }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn notify(&self, processed: usize, total: usize) {
        if let Some(sink) = &self.inner {
            sink.on_progress(processed, total);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

// ==========================================
// 取消标志
// ==========================================

/// 跨任务共享的取消标志（克隆后共享同一状态）
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消（在下一个块边界生效）
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
