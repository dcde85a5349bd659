// ==========================================
// 会员名册导入查重引擎 - 既有记录源错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅 SourceUnavailable（瞬时故障）可重试，数据与加载错误直接暴露
// ==========================================

use thiserror::Error;

/// 既有记录源错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 可重试错误 =====
    #[error("既有记录源不可用: {0}")]
    SourceUnavailable(String),

    // ===== 数据错误 =====
    #[error("既有记录缺少 ID 列: {0}")]
    MissingIdColumn(String),

    #[error("既有记录数据错误 (position={position}): {message}")]
    InvalidRecord { position: usize, message: String },

    // ===== 加载错误（不可重试）=====
    #[error("既有记录文件无法加载 {path}: {message}")]
    Load { path: String, message: String },
}

impl RepositoryError {
    /// 是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::SourceUnavailable(_))
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_retryable() {
        assert!(RepositoryError::SourceUnavailable("timeout".to_string()).is_retryable());
        assert!(!RepositoryError::MissingIdColumn("id".to_string()).is_retryable());
        assert!(!RepositoryError::Load {
            path: "members.csv".to_string(),
            message: "文件不存在".to_string(),
        }
        .is_retryable());
    }
}
