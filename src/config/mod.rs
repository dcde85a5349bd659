// ==========================================
// 会员名册导入查重引擎 - 配置层
// ==========================================
// 职责: 导入配置档加载、批次配置、配置错误
// 红线: 所有配置显式提供，运行期间不可变
// ==========================================

pub mod batch_config;
pub mod error;
pub mod import_profile;

// 重导出核心配置类型
pub use batch_config::BatchConfig;
pub use error::ConfigError;
pub use import_profile::{check_field_references, ImportProfile, RuntimeConfig};
