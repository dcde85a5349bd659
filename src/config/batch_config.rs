// ==========================================
// 会员名册导入查重引擎 - 批次运行配置
// ==========================================
// 职责: 分块大小 / 重试策略 / 快速失败 / 并行度
// 说明: 分块大小只影响资源占用，不影响结果
// ==========================================

use crate::config::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// 每块行数
    pub chunk_size: usize,
    /// 既有记录源访问的总尝试次数（含首次）
    pub retry_attempts: u32,
    /// 两次尝试之间的等待（毫秒）
    pub retry_backoff_ms: u64,
    /// 重试耗尽时是否中止整个批次
    pub fail_fast_on_source_error: bool,
    /// 块内并行线程数（None = rayon 默认）
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// 块内并发拉取分块的上限
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// 同批次内判重字段（None = 不检测）
    #[serde(default)]
    pub batch_identity_field: Option<String>,
}

fn default_max_concurrent_fetches() -> usize {
    8
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            retry_attempts: 3,
            retry_backoff_ms: 200,
            fail_fast_on_source_error: false,
            max_workers: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            batch_identity_field: None,
        }
    }
}

impl BatchConfig {
    /// 校验批次配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts);
        }
        if self.max_workers == Some(0) {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::InvalidFetchConcurrency);
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = BatchConfig::default();
        config.chunk_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidChunkSize));

        let mut config = BatchConfig::default();
        config.retry_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRetryAttempts));

        let mut config = BatchConfig::default();
        config.max_workers = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidWorkerCount));
    }
}
