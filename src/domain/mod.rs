// ==========================================
// 会员名册导入查重引擎 - 领域模型层
// ==========================================
// 职责: 定义记录、模式、查重配置、批次报告
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod matching;
pub mod record;
pub mod report;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use matching::{CandidateMatch, FieldWeight, MatchingConfig, ResolutionResult};
pub use record::{
    AcceptedRecord, ExistingRecord, FieldValue, FieldViolation, RawRow, RejectedRow,
    ValidationOutcome,
};
pub use report::{
    BatchCounts, BatchReport, IntraBatchDuplicate, ResolutionOutcome, ResolvedRecord,
};
pub use schema::{FieldSpec, FormatConstraint, Schema};
pub use types::{BatchState, FieldType, MissingFieldPolicy, NormalizationStrategy, ViolationKind};
