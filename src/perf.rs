use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static FETCH_COUNT: AtomicU64 = AtomicU64::new(0);
static SLOW_FETCH_COUNT: AtomicU64 = AtomicU64::new(0);
static SLOW_FETCH_THRESHOLD_MS: OnceLock<u64> = OnceLock::new();

fn slow_fetch_threshold_ms() -> u64 {
    *SLOW_FETCH_THRESHOLD_MS.get_or_init(|| {
        std::env::var("ROSTER_INGEST_SLOW_FETCH_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 })
    })
}

/// 记录一次既有记录源读取（用于读取计数 + 慢读取日志）
///
/// 阈值：`ROSTER_INGEST_SLOW_FETCH_MS=50` 配置慢读取阈值（毫秒，0 = 关闭）
pub fn record_fetch(kind: &'static str, duration: Duration) {
    FETCH_COUNT.fetch_add(1, Ordering::Relaxed);

    let ms = duration.as_millis() as u64;
    let threshold = slow_fetch_threshold_ms();
    if threshold > 0 && ms >= threshold {
        SLOW_FETCH_COUNT.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            target: "slow_fetch",
            duration_ms = ms,
            kind,
            "slow source fetch"
        );
    }
}

/// 性能统计 Guard：记录 elapsed_ms + 源读取次数 + 慢读取次数
///
/// 使用方式：
/// ```ignore
/// let _perf = roster_ingest::perf::PerfGuard::new("resolve_chunk");
/// // do work...
/// ```
///
/// 读取计数为进程级累计值的差，多个批次并发运行时仅供参考
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    fetch_start: u64,
    slow_fetch_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            fetch_start: FETCH_COUNT.load(Ordering::Relaxed),
            slow_fetch_start: SLOW_FETCH_COUNT.load(Ordering::Relaxed),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        let fetch_count = FETCH_COUNT
            .load(Ordering::Relaxed)
            .saturating_sub(self.fetch_start);
        let slow_fetch_count = SLOW_FETCH_COUNT
            .load(Ordering::Relaxed)
            .saturating_sub(self.slow_fetch_start);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            fetch_count,
            slow_fetch_count,
            "done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fetch_increments_counter() {
        let before = FETCH_COUNT.load(Ordering::Relaxed);
        record_fetch("fetch_all", Duration::from_millis(1));
        assert!(FETCH_COUNT.load(Ordering::Relaxed) > before);
    }
}
