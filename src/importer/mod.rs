// ==========================================
// 会员名册导入查重引擎 - 导入层
// ==========================================
// 职责: 分隔文本解析、数据清洗、逐行模式校验、同批次重复检测
// ==========================================

// 模块声明
pub mod conflict_handler;
pub mod data_cleaner;
pub mod error;
pub mod file_parser;
pub mod importer_trait;
pub mod record_validator;

// 重导出核心类型
pub use conflict_handler::ConflictHandler;
pub use error::{ImportError, ImportResult};
pub use file_parser::CsvParser;
pub use record_validator::{canonicalize_existing, validate, RecordValidator};

// 重导出 Trait 接口
pub use importer_trait::{FileParser, RowValidator};
