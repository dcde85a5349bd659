// ==========================================
// 会员名册导入查重引擎 - CSV 既有记录源
// ==========================================
// 职责: 从分隔文本文件加载既有记录（一次加载，之后只读）
// 约束: ID 列必须存在且非空，ID 不得重复
// ==========================================

use crate::domain::record::ExistingRecord;
use crate::importer::error::ImportError;
use crate::importer::file_parser::CsvParser;
use crate::importer::importer_trait::FileParser;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::existing_record_source::ExistingRecordSource;
use crate::repository::in_memory_source::InMemoryRecordSource;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    inner: InMemoryRecordSource,
}

impl CsvRecordSource {
    /// 加载 CSV 文件
    ///
    /// # 参数
    /// - path: 文件路径
    /// - id_column: 记录 ID 所在列（该列不进入比对字段）
    pub fn load(path: &Path, id_column: &str) -> RepositoryResult<Self> {
        let rows = CsvParser::new()
            .parse_to_raw_rows(path)
            .map_err(|e| match e {
                // 读取中途的 I/O 故障可重试，其余（路径、格式、CSV 结构）不可重试
                ImportError::FileReadError(message) => RepositoryError::SourceUnavailable(message),
                other => RepositoryError::Load {
                    path: path.display().to_string(),
                    message: other.to_string(),
                },
            })?;

        if !rows.is_empty() && rows.iter().all(|r| !r.values.contains_key(id_column)) {
            return Err(RepositoryError::MissingIdColumn(id_column.to_string()));
        }

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(rows.len());
        for mut row in rows {
            let id = row
                .values
                .remove(id_column)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| RepositoryError::InvalidRecord {
                    position: row.position,
                    message: format!("{} 为空", id_column),
                })?;
            if !seen.insert(id.clone()) {
                return Err(RepositoryError::InvalidRecord {
                    position: row.position,
                    message: format!("重复的记录 ID: {}", id),
                });
            }
            records.push(ExistingRecord::new(id, row.values));
        }

        info!(path = %path.display(), records = records.len(), "既有记录加载完成");
        Ok(Self {
            inner: InMemoryRecordSource::new(records),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ExistingRecordSource for CsvRecordSource {
    async fn fetch_by_blocking_value(
        &self,
        field: &str,
        value: &str,
    ) -> RepositoryResult<Vec<ExistingRecord>> {
        self.inner.fetch_by_blocking_value(field, value).await
    }

    async fn fetch_all(&self) -> RepositoryResult<Vec<ExistingRecord>> {
        self.inner.fetch_all().await
    }
}
