// ==========================================
// 会员名册导入查重引擎 - 同批次重复检测
// ==========================================
// 职责: 按批次标识字段检测同一导入文件内的重复行
// 说明: 只登记，不改变计数；首次出现的行不计为重复
// ==========================================

use crate::domain::record::AcceptedRecord;
use crate::domain::report::IntraBatchDuplicate;
use crate::importer::data_cleaner::normalize_blocking_key;
use std::collections::HashMap;

/// 同批次重复检测器（跨块保持状态）
#[derive(Debug, Clone)]
pub struct ConflictHandler {
    field: String,
    first_occurrence: HashMap<String, usize>, // 归一化键 → 首次出现位置
}

impl ConflictHandler {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            first_occurrence: HashMap::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// 观察一条已接受记录
    ///
    /// # 返回
    /// - Some: 该键此前已出现过
    /// - None: 首次出现，或标识字段为空
    pub fn observe(&mut self, record: &AcceptedRecord) -> Option<IntraBatchDuplicate> {
        let key = record
            .match_text(&self.field)
            .and_then(|v| normalize_blocking_key(&v))?;

        match self.first_occurrence.get(&key) {
            Some(&first_position) => Some(IntraBatchDuplicate {
                position: record.position,
                first_position,
                field: self.field.clone(),
                key,
            }),
            None => {
                self.first_occurrence.insert(key, record.position);
                None
            }
        }
    }

    /// 批量检测（按输入顺序）
    pub fn detect_duplicates<'a, I>(&mut self, records: I) -> Vec<IntraBatchDuplicate>
    where
        I: IntoIterator<Item = &'a AcceptedRecord>,
    {
        records
            .into_iter()
            .filter_map(|record| self.observe(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::FieldValue;
    use std::collections::BTreeMap;

    fn create_test_record(email: Option<&str>, position: usize) -> AcceptedRecord {
        let mut values = BTreeMap::new();
        values.insert("lastName".to_string(), FieldValue::Text("Doe".to_string()));
        if let Some(email) = email {
            values.insert(
                "email".to_string(),
                FieldValue::Identifier(email.to_string()),
            );
        }
        AcceptedRecord { position, values }
    }

    #[test]
    fn test_detect_duplicates_none() {
        let mut handler = ConflictHandler::new("email");
        let records = vec![
            create_test_record(Some("a@x.com"), 1),
            create_test_record(Some("b@x.com"), 2),
        ];

        assert!(handler.detect_duplicates(&records).is_empty());
    }

    #[test]
    fn test_detect_duplicates_found_case_insensitive() {
        let mut handler = ConflictHandler::new("email");
        let records = vec![
            create_test_record(Some("a@x.com"), 1),
            create_test_record(Some("b@x.com"), 2),
            create_test_record(Some(" A@X.com "), 3),
        ];

        let duplicates = handler.detect_duplicates(&records);

        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].position, 3);
        assert_eq!(duplicates[0].first_position, 1);
        assert_eq!(duplicates[0].key, "a@x.com");
    }

    #[test]
    fn test_state_carries_across_calls_and_skips_missing() {
        let mut handler = ConflictHandler::new("email");
        assert!(handler.observe(&create_test_record(Some("a@x.com"), 1)).is_none());
        assert!(handler.observe(&create_test_record(None, 2)).is_none());
        assert!(handler.observe(&create_test_record(None, 3)).is_none());

        let dup = handler.observe(&create_test_record(Some("a@x.com"), 40));
        assert_eq!(dup.map(|d| d.first_position), Some(1));
    }
}
