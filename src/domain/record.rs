// ==========================================
// 会员名册导入查重引擎 - 记录领域模型
// ==========================================
// 职责: 原始行 / 已接受记录 / 拒绝行 / 既有记录
// 红线: RawRow 解析后不可变；ExistingRecord 只读
// ==========================================

use crate::domain::types::{FieldType, ViolationKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ==========================================
// RawRow - 原始行
// ==========================================
// 用途: 外部解析器产出（列名 → 原始文本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub position: usize, // 源文件位置（从 1 开始，用于错误报告）
    pub values: HashMap<String, String>,
}

impl RawRow {
    pub fn new(position: usize, values: HashMap<String, String>) -> Self {
        Self { position, values }
    }

    /// 由 (列名, 值) 对构造，便于测试与外部适配
    pub fn from_pairs<K, V, I>(position: usize, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            position,
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(|v| v.as_str())
    }
}

// ==========================================
// FieldValue - 类型化字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum FieldValue {
    Text(String),
    Identifier(String),
    Enumeration(String),
    Date(NaiveDate),
    Numeric(f64),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Identifier(_) => FieldType::Identifier,
            FieldValue::Enumeration(_) => FieldType::Enumeration,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::Numeric(_) => FieldType::Numeric,
        }
    }

    /// 比对用文本形式（日期统一为 YYYY-MM-DD）
    pub fn as_match_text(&self) -> String {
        match self {
            FieldValue::Text(v) | FieldValue::Identifier(v) | FieldValue::Enumeration(v) => {
                v.clone()
            }
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FieldValue::Numeric(n) => n.to_string(),
        }
    }
}

// ==========================================
// AcceptedRecord - 校验通过的记录
// ==========================================
// 不变式: 每个必填字段都有值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRecord {
    pub position: usize,
    pub values: BTreeMap<String, FieldValue>,
}

impl AcceptedRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn match_text(&self, field: &str) -> Option<String> {
        self.values.get(field).map(FieldValue::as_match_text)
    }
}

// ==========================================
// FieldViolation - 字段级违规
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,      // 违规字段
    pub kind: ViolationKind, // 违规类型
    pub constraint: String, // 违反的约束（required / 期望类型 / 规则描述）
    pub message: String,    // 违规描述
}

// ==========================================
// RejectedRow - 被拒绝的行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row: RawRow,
    pub violations: Vec<FieldViolation>, // 按模式字段顺序排列
}

impl RejectedRow {
    pub fn position(&self) -> usize {
        self.row.position
    }
}

// ==========================================
// ValidationOutcome - 校验结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ValidationOutcome {
    Accepted(AcceptedRecord),
    Rejected(RejectedRow),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn position(&self) -> usize {
        match self {
            ValidationOutcome::Accepted(record) => record.position,
            ValidationOutcome::Rejected(rejected) => rejected.row.position,
        }
    }
}

// ==========================================
// ExistingRecord - 既有记录（库内）
// ==========================================
// 用途: 既有记录源返回，查重比对对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub id: String,
    pub values: HashMap<String, String>,
}

impl ExistingRecord {
    pub fn new(id: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }

    pub fn from_pairs<K, V, I>(id: impl Into<String>, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            id: id.into(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(|v| v.as_str())
    }
}
