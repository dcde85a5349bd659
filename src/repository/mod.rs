// ==========================================
// 会员名册导入查重引擎 - 既有记录源层
// ==========================================
// 红线: 既有记录源只读，不含查重逻辑
// ==========================================

pub mod csv_record_source;
pub mod error;
pub mod existing_record_source;
pub mod in_memory_source;

// 重导出
pub use csv_record_source::CsvRecordSource;
pub use error::{RepositoryError, RepositoryResult};
pub use existing_record_source::ExistingRecordSource;
pub use in_memory_source::InMemoryRecordSource;
