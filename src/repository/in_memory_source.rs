// ==========================================
// 会员名册导入查重引擎 - 内存既有记录源
// ==========================================
// 职责: 以内存快照提供既有记录（测试、CLI 小规模数据）
// ==========================================

use crate::domain::record::ExistingRecord;
use crate::importer::data_cleaner::normalize_blocking_key;
use crate::repository::error::RepositoryResult;
use crate::repository::existing_record_source::ExistingRecordSource;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    records: Arc<Vec<ExistingRecord>>,
}

impl InMemoryRecordSource {
    pub fn new(records: Vec<ExistingRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ExistingRecordSource for InMemoryRecordSource {
    async fn fetch_by_blocking_value(
        &self,
        field: &str,
        value: &str,
    ) -> RepositoryResult<Vec<ExistingRecord>> {
        let Some(wanted) = normalize_blocking_key(value) else {
            return Ok(Vec::new());
        };
        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.get(field)
                    .and_then(normalize_blocking_key)
                    .map_or(false, |key| key == wanted)
            })
            .cloned()
            .collect())
    }

    async fn fetch_all(&self) -> RepositoryResult<Vec<ExistingRecord>> {
        Ok(self.records.as_ref().clone())
    }
}
