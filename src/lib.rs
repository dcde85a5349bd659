// ==========================================
// 会员名册导入查重引擎 - 核心库
// ==========================================
// 定位: 批量导入名册 → 模式校验 → 与既有记录模糊查重 → 批次报告
// 边界: 不负责上传传输、界面展示、持久化与通知
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录、模式、查重结果、报告
pub mod domain;

// 配置层 - 导入配置档
pub mod config;

// 导入层 - 文件解析与校验
pub mod importer;

// 既有记录源层 - 只读数据访问
pub mod repository;

// 引擎层 - 打分、分块、判定、编排
pub mod engine;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BatchState, FieldType, MissingFieldPolicy, NormalizationStrategy, ViolationKind,
};

// 领域实体
pub use domain::{
    AcceptedRecord, BatchCounts, BatchReport, CandidateMatch, ExistingRecord, FieldSpec,
    FieldValue, FieldViolation, FieldWeight, FormatConstraint, IntraBatchDuplicate,
    MatchingConfig, RawRow, RejectedRow, ResolutionOutcome, ResolutionResult, ResolvedRecord,
    Schema, ValidationOutcome,
};

// 配置
pub use config::{BatchConfig, ConfigError, ImportProfile, RuntimeConfig};

// 导入层
pub use importer::{CsvParser, FileParser, ImportError, ImportResult, RecordValidator, RowValidator};

// 既有记录源
pub use repository::{
    CsvRecordSource, ExistingRecordSource, InMemoryRecordSource, RepositoryError,
};

// 引擎
pub use engine::{
    resolve, similarity, BatchOrchestrator, BlockingIndex, CancellationFlag, NoOpProgressSink,
    ProgressSink, TracingProgressSink,
};

// ==========================================
// 系统常量
// ==========================================

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "会员名册导入查重引擎";
