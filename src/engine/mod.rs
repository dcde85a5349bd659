// ==========================================
// 会员名册导入查重引擎 - 引擎层
// ==========================================
// 职责: 相似度打分、分块索引、重复判定、批次编排
// 红线: 打分与判定为纯函数；只有既有记录源读取会挂起
// ==========================================

pub mod blocking_index;
pub mod duplicate_resolver;
pub mod events;
pub mod orchestrator;
pub mod report_builder;
pub mod similarity;

// 重导出核心引擎
pub use blocking_index::BlockingIndex;
pub use duplicate_resolver::{resolve, score_candidate, DuplicateResolver};
pub use events::{
    CancellationFlag, NoOpProgressSink, OptionalProgressSink, ProgressSink, TracingProgressSink,
};
pub use orchestrator::BatchOrchestrator;
pub use report_builder::ReportBuilder;
pub use similarity::{edit_ratio, similarity};
