// ==========================================
// 会员名册导入查重引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级校验违规不是错误，记录在 RejectedRow 中
// ==========================================

use crate::config::error::ConfigError;
use crate::domain::types::BatchState;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.tsv/.txt）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 配置错误 =====
    #[error("配置错误: {0}")]
    Configuration(#[from] ConfigError),

    // ===== 既有记录源错误 =====
    #[error("既有记录源错误: {0}")]
    Source(#[from] RepositoryError),

    // ===== 批次运行错误 =====
    #[error("无效的批次状态转换: from={from} to={to}")]
    InvalidStateTransition { from: BatchState, to: BatchState },

    #[error("块内工作线程失败: {0}")]
    WorkerFailure(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InternalError(format!("JSON 序列化失败: {}", err))
    }
}

// 实现 From<tokio::task::JoinError>
impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::WorkerFailure(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
