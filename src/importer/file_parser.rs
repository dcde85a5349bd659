// ==========================================
// 会员名册导入查重引擎 - 文件解析器实现
// ==========================================
// 支持: 分隔文本 (.csv / .tsv / .txt)
// 说明: 行位置按数据行计数（表头不计），跳过空白行但不重新编号
// ==========================================

use crate::domain::record::RawRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];

// ==========================================
// CSV Parser 实现
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CsvParser {
    delimiter: Option<u8>, // None = 按扩展名推断（.tsv 为制表符，其余为逗号）
}

impl CsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定分隔符（覆盖扩展名推断）
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    /// 从任意 Reader 解析（首行为表头）
    pub fn parse_reader<R: Read>(&self, reader: R, delimiter: u8) -> ImportResult<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true) // 允许行长度不一致
            .from_reader(reader);

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut values = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if !header.is_empty() {
                        values.insert(header.clone(), value.trim().to_string());
                    }
                }
            }

            // 跳过完全空白的行
            if values.values().all(|v| v.is_empty()) {
                debug!(position = row_idx + 1, "跳过空白行");
                continue;
            }

            rows.push(RawRow::new(row_idx + 1, values));
        }

        Ok(rows)
    }

    fn resolve_delimiter(&self, ext: &str) -> u8 {
        self.delimiter
            .unwrap_or(if ext == "tsv" { b'\t' } else { b',' })
    }
}

impl FileParser for CsvParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        // 检查文件存在
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        // 检查扩展名
        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let rows = self.parse_reader(file, self.resolve_delimiter(&ext))?;
        debug!(path = %file_path.display(), rows = rows.len(), "文件解析完成");
        Ok(rows)
    }
}
