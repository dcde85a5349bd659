// ==========================================
// 会员名册导入查重引擎 - 导入层 Trait
// ==========================================
// 职责: 定义文件解析、行校验接口（不包含实现）
// ==========================================

use crate::domain::record::{RawRow, ValidationOutcome};
use crate::importer::error::ImportResult;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 分隔文本 → 原始行
// 实现者: CsvParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行
    ///
    /// # 参数
    /// - file_path: 文件路径
    ///
    /// # 返回
    /// - Ok(Vec<RawRow>): 按源文件顺序排列，position 从 1 开始
    /// - Err: 文件读取错误、格式错误
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 单行模式校验（纯函数，无副作用）
// 实现者: RecordValidator
pub trait RowValidator: Send + Sync {
    /// 校验单行
    ///
    /// # 返回
    /// - Accepted: 全部字段通过，值已类型化并归一化
    /// - Rejected: 收集到的全部违规（不在首个错误处短路）
    fn validate(&self, row: &RawRow) -> ValidationOutcome;
}
