// ==========================================
// 会员名册导入查重引擎 - 领域类型定义
// ==========================================
// 职责: 字段语义类型 / 归一化策略 / 违规类型 / 批次状态
// 序列化格式: kebab-case (与导入配置文件一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 字段语义类型 (Field Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,        // 自由文本（姓名、公司名）
    Identifier,  // 标识符（邮箱、电话、会员号）
    Enumeration, // 枚举（会员类型、状态）
    Date,        // 日期
    Numeric,     // 数值
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Identifier => write!(f, "identifier"),
            FieldType::Enumeration => write!(f, "enumeration"),
            FieldType::Date => write!(f, "date"),
            FieldType::Numeric => write!(f, "numeric"),
        }
    }
}

// ==========================================
// 归一化策略 (Normalization Strategy)
// ==========================================
// 用途: 决定两个字段值如何比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationStrategy {
    Exact,     // 去空白 + 忽略大小写的精确匹配
    EditRatio, // Levenshtein 编辑距离比
    Phone,     // 仅保留数字后精确匹配
    Email,     // 小写 + 去空白后精确匹配
}

impl NormalizationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationStrategy::Exact => "exact",
            NormalizationStrategy::EditRatio => "edit-ratio",
            NormalizationStrategy::Phone => "phone",
            NormalizationStrategy::Email => "email",
        }
    }
}

impl fmt::Display for NormalizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationStrategy {
    type Err = String;

    /// 解析配置中的策略标签（大小写不敏感，`_` 等价于 `-`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "exact" => Ok(NormalizationStrategy::Exact),
            "edit-ratio" | "levenshtein" => Ok(NormalizationStrategy::EditRatio),
            "phone" => Ok(NormalizationStrategy::Phone),
            "email" => Ok(NormalizationStrategy::Email),
            other => Err(other.to_string()),
        }
    }
}

// ==========================================
// 单侧缺失策略 (Missing Field Policy)
// ==========================================
// 两侧都缺失的字段总是从分母中剔除；此策略只管单侧缺失
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFieldPolicy {
    #[default]
    CountAsMismatch, // 相似度记 0，权重计入分母
    IgnoreField,     // 权重不计入分母
}

// ==========================================
// 校验违规类型 (Violation Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    MissingField,    // 必填字段缺失或为空
    TypeMismatch,    // 类型不符
    FormatViolation, // 格式约束违反
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::MissingField => write!(f, "MISSING_FIELD"),
            ViolationKind::TypeMismatch => write!(f, "TYPE_MISMATCH"),
            ViolationKind::FormatViolation => write!(f, "FORMAT_VIOLATION"),
        }
    }
}

// ==========================================
// 批次运行状态 (Batch State)
// ==========================================
// Idle -> Validating -> Resolving -> Completed
// Validating/Resolving -> Aborted | Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Idle,
    Validating,
    Resolving,
    Completed,
    Aborted,
    Cancelled,
}

impl BatchState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchState::Completed | BatchState::Aborted | BatchState::Cancelled
        )
    }

    /// 状态迁移是否合法
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Idle, Completed)
                | (Idle, Cancelled)
                | (Validating, Resolving)
                | (Validating, Aborted)
                | (Resolving, Validating)
                | (Resolving, Completed)
                | (Resolving, Aborted)
                | (Resolving, Cancelled)
        )
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Idle => write!(f, "IDLE"),
            BatchState::Validating => write!(f, "VALIDATING"),
            BatchState::Resolving => write!(f, "RESOLVING"),
            BatchState::Completed => write!(f, "COMPLETED"),
            BatchState::Aborted => write!(f, "ABORTED"),
            BatchState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}
