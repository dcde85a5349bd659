// ==========================================
// 会员名册导入查重引擎 - 分块索引
// ==========================================
// 职责: 按分块字段归一化取值把既有记录分桶，缩小比对范围
// 红线: 构建后只读；语料变化时由调用方重建
// ==========================================

use crate::domain::record::ExistingRecord;
use crate::domain::schema::Schema;
use crate::importer::data_cleaner::normalize_blocking_key;
use crate::importer::record_validator::canonicalize_existing;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ==========================================
// BlockingIndex - 分块索引快照
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BlockingIndex {
    blocking_field: Option<String>,
    all: Vec<Arc<ExistingRecord>>,
    buckets: HashMap<String, Vec<Arc<ExistingRecord>>>,
}

impl BlockingIndex {
    /// 构建索引
    ///
    /// # 参数
    /// - records: 既有记录（桶内保持该顺序）
    /// - blocking_field: 分块字段（None 或空白 = 全量扫描）
    ///
    /// # 说明
    /// - 分块取值缺失的既有记录不进入任何桶
    pub fn build(records: Vec<ExistingRecord>, blocking_field: Option<&str>) -> Self {
        let blocking_field = blocking_field
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        let all: Vec<Arc<ExistingRecord>> = records.into_iter().map(Arc::new).collect();

        let Some(field) = blocking_field else {
            if !all.is_empty() {
                warn!(
                    records = all.len(),
                    "未配置分块字段，每条记录将与全部既有记录比对（全量扫描）"
                );
            }
            return Self {
                blocking_field: None,
                all,
                buckets: HashMap::new(),
            };
        };

        let mut buckets: HashMap<String, Vec<Arc<ExistingRecord>>> = HashMap::new();
        let mut unkeyed = 0usize;
        for record in &all {
            match record.get(&field).and_then(normalize_blocking_key) {
                Some(key) => buckets.entry(key).or_default().push(Arc::clone(record)),
                None => unkeyed += 1,
            }
        }
        debug!(
            blocking_field = %field,
            records = all.len(),
            buckets = buckets.len(),
            unkeyed,
            "分块索引构建完成"
        );

        Self {
            blocking_field: Some(field),
            all,
            buckets,
        }
    }

    /// 按模式归一化既有记录后构建索引
    ///
    /// 索引内的取值与校验后的已接受记录处于同一形式，打分与取桶都按规范值进行
    pub fn build_with_schema(
        records: Vec<ExistingRecord>,
        blocking_field: Option<&str>,
        schema: &Schema,
    ) -> Self {
        let records = records
            .into_iter()
            .map(|record| canonicalize_existing(record, schema))
            .collect();
        Self::build(records, blocking_field)
    }

    /// 查找候选记录
    ///
    /// # 返回
    /// - 全量扫描模式: 全部记录（忽略 value）
    /// - 分块模式: 归一化取值对应的桶；取值缺失或无此桶时为空
    pub fn lookup(&self, value: Option<&str>) -> &[Arc<ExistingRecord>] {
        if self.blocking_field.is_none() {
            return &self.all;
        }
        value
            .and_then(normalize_blocking_key)
            .and_then(|key| self.buckets.get(&key))
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    pub fn blocking_field(&self) -> Option<&str> {
        self.blocking_field.as_deref()
    }

    pub fn is_full_scan(&self) -> bool {
        self.blocking_field.is_none()
    }

    /// 索引内既有记录总数
    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<ExistingRecord> {
        vec![
            ExistingRecord::from_pairs("E1", [("lastName", "Smith")]),
            ExistingRecord::from_pairs("E2", [("lastName", "Doe")]),
            ExistingRecord::from_pairs("E3", [("lastName", " SMITH")]),
            ExistingRecord::from_pairs("E4", [("lastName", "")]),
            ExistingRecord::from_pairs("E5", [("email", "x@y.z")]),
        ]
    }

    fn ids(records: &[Arc<ExistingRecord>]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_lookup_returns_bucket_in_insertion_order() {
        let index = BlockingIndex::build(corpus(), Some("lastName"));
        assert_eq!(ids(index.lookup(Some("smith "))), vec!["E1", "E3"]);
        assert_eq!(ids(index.lookup(Some("Doe"))), vec!["E2"]);
        assert_eq!(index.bucket_count(), 2);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_missing_value_gets_no_candidates() {
        let index = BlockingIndex::build(corpus(), Some("lastName"));
        assert!(index.lookup(None).is_empty());
        assert!(index.lookup(Some("   ")).is_empty());
        assert!(index.lookup(Some("Nguyen")).is_empty());
    }

    #[test]
    fn test_schema_aware_build_buckets_dates_by_canonical_value() {
        use crate::domain::schema::FieldSpec;
        use crate::domain::types::FieldType;

        let schema = Schema::new(vec![FieldSpec::new("joinedOn", FieldType::Date, false)]).unwrap();
        let records = vec![
            ExistingRecord::from_pairs("E1", [("joinedOn", "03/15/2024")]),
            ExistingRecord::from_pairs("E2", [("joinedOn", "20240315")]),
            ExistingRecord::from_pairs("E3", [("joinedOn", "2024-03-16")]),
        ];
        let index = BlockingIndex::build_with_schema(records, Some("joinedOn"), &schema);

        assert_eq!(ids(index.lookup(Some("2024-03-15"))), vec!["E1", "E2"]);
        assert_eq!(index.lookup(Some("2024-03-15"))[0].get("joinedOn"), Some("2024-03-15"));
        assert_eq!(index.bucket_count(), 2);
    }

    #[test]
    fn test_full_scan_without_blocking_field() {
        let index = BlockingIndex::build(corpus(), None);
        assert!(index.is_full_scan());
        assert_eq!(index.lookup(Some("anything")).len(), 5);
        assert_eq!(index.lookup(None).len(), 5);

        let blank = BlockingIndex::build(corpus(), Some("  "));
        assert!(blank.is_full_scan());
    }
}
