// ==========================================
// 会员名册导入查重引擎 - 记录校验器
// ==========================================
// 职责: 必填 / 类型 / 格式约束校验，收集全部违规后再判定
// 红线: 纯函数；模式外的未知列忽略，不视为错误
// ==========================================

use crate::domain::record::{
    AcceptedRecord, ExistingRecord, FieldValue, FieldViolation, RawRow, RejectedRow,
    ValidationOutcome,
};
use crate::domain::schema::{CompiledConstraint, CompiledField, FormatConstraint, Schema};
use crate::domain::types::{FieldType, ViolationKind};
use crate::importer::data_cleaner::{normalize_null, normalize_phone, parse_date, parse_numeric};
use crate::importer::importer_trait::RowValidator;
use std::collections::BTreeMap;
use std::sync::Arc;

// ==========================================
// RecordValidator - 持有模式的校验器
// ==========================================
pub struct RecordValidator {
    schema: Arc<Schema>,
}

impl RecordValidator {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl RowValidator for RecordValidator {
    fn validate(&self, row: &RawRow) -> ValidationOutcome {
        validate(row, &self.schema)
    }
}

/// 按模式校验单行
///
/// # 规则
/// 1. 必填字段缺失或空白 → MissingField
/// 2. 类型不符 → TypeMismatch（该字段不再检查格式约束）
/// 3. 格式约束不满足 → FormatViolation（逐条约束）
pub fn validate(row: &RawRow, schema: &Schema) -> ValidationOutcome {
    let mut values = BTreeMap::new();
    let mut violations = Vec::new();

    for field in schema.fields() {
        let spec = &field.spec;
        let raw = match normalize_null(row.get(&spec.name)) {
            Some(v) => v,
            None => {
                if spec.required {
                    violations.push(FieldViolation {
                        field: spec.name.clone(),
                        kind: ViolationKind::MissingField,
                        constraint: "required".to_string(),
                        message: "必填字段缺失或为空".to_string(),
                    });
                }
                continue;
            }
        };

        let value = match convert_value(field, raw) {
            Ok(value) => value,
            Err(message) => {
                violations.push(FieldViolation {
                    field: spec.name.clone(),
                    kind: ViolationKind::TypeMismatch,
                    constraint: spec.field_type.to_string(),
                    message,
                });
                continue;
            }
        };

        let before = violations.len();
        for constraint in &field.constraints {
            if let Some(message) = check_constraint(constraint, raw, &value) {
                violations.push(FieldViolation {
                    field: spec.name.clone(),
                    kind: ViolationKind::FormatViolation,
                    constraint: constraint.source().describe(),
                    message,
                });
            }
        }

        if violations.len() == before {
            values.insert(spec.name.clone(), value);
        }
    }

    if violations.is_empty() {
        ValidationOutcome::Accepted(AcceptedRecord {
            position: row.position,
            values,
        })
    } else {
        ValidationOutcome::Rejected(RejectedRow {
            row: row.clone(),
            violations,
        })
    }
}

/// 把既有记录的取值转换为与已接受记录相同的比对形式
///
/// # 规则
/// - 模式内字段: 按字段类型转换（日期 → YYYY-MM-DD，数值去千分位，枚举取规范写法）
/// - 转换失败或模式外字段: 仅 TRIM，保留原文参与比对
pub fn canonicalize_existing(mut record: ExistingRecord, schema: &Schema) -> ExistingRecord {
    for (name, value) in record.values.iter_mut() {
        let Some(field) = schema.compiled_field(name) else {
            continue;
        };
        let Some(raw) = normalize_null(Some(value.as_str())) else {
            continue;
        };
        let canonical = match convert_value(field, raw) {
            Ok(converted) => converted.as_match_text(),
            Err(_) => raw.to_string(),
        };
        *value = canonical;
    }
    record
}

/// 类型转换（值已 TRIM 且非空）
fn convert_value(field: &CompiledField, raw: &str) -> Result<FieldValue, String> {
    match field.spec.field_type {
        FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldType::Identifier => {
            if raw.chars().any(char::is_control) {
                Err("标识符包含控制字符".to_string())
            } else {
                Ok(FieldValue::Identifier(raw.to_string()))
            }
        }
        FieldType::Enumeration => {
            // 映射为允许取值的规范写法；不在集合内时保留原值，由 one-of 约束报告
            let canonical = field
                .spec
                .allowed_values()
                .and_then(|allowed| allowed.iter().find(|a| a.eq_ignore_ascii_case(raw)))
                .cloned()
                .unwrap_or_else(|| raw.to_string());
            Ok(FieldValue::Enumeration(canonical))
        }
        FieldType::Date => parse_date(raw)
            .map(FieldValue::Date)
            .ok_or_else(|| format!("无法解析为日期: {}", raw)),
        FieldType::Numeric => parse_numeric(raw)
            .map(FieldValue::Numeric)
            .ok_or_else(|| format!("无法解析为数值: {}", raw)),
    }
}

/// 检查单条约束，违反时返回描述
fn check_constraint(constraint: &CompiledConstraint, raw: &str, value: &FieldValue) -> Option<String> {
    match constraint {
        CompiledConstraint::Pattern { regex, .. } => {
            (!regex.is_match(raw)).then(|| format!("值不匹配格式 {}", regex.as_str()))
        }
        CompiledConstraint::Email { regex, .. } => {
            (!regex.is_match(raw)).then(|| format!("邮箱格式错误: {}", raw))
        }
        CompiledConstraint::Plain(rule) => check_plain(rule, raw, value),
    }
}

fn check_plain(rule: &FormatConstraint, raw: &str, value: &FieldValue) -> Option<String> {
    match rule {
        FormatConstraint::OneOf { values } => (!values.iter().any(|v| v.eq_ignore_ascii_case(raw)))
            .then(|| format!("值 {} 不在允许集合内 [{}]", raw, values.join(", "))),
        FormatConstraint::MinLength { min } => {
            let len = raw.chars().count();
            (len < *min).then(|| format!("长度 {} 小于 {}", len, min))
        }
        FormatConstraint::MaxLength { max } => {
            let len = raw.chars().count();
            (len > *max).then(|| format!("长度 {} 超过 {}", len, max))
        }
        FormatConstraint::Range { min, max } => {
            let number = match value {
                FieldValue::Numeric(n) => Some(*n),
                _ => parse_numeric(raw),
            };
            match number {
                None => Some(format!("范围约束要求数值: {}", raw)),
                Some(n) if min.map_or(false, |lo| n < lo) || max.map_or(false, |hi| n > hi) => {
                    Some(format!("值 {} 超出范围 {}", n, rule.describe()))
                }
                Some(_) => None,
            }
        }
        FormatConstraint::Phone {
            min_digits,
            max_digits,
        } => {
            let digits = normalize_phone(raw).len();
            (digits < *min_digits || digits > *max_digits)
                .then(|| format!("电话号码位数 {} 不在 {}..={} 内", digits, min_digits, max_digits))
        }
        // 正则与邮箱在编译阶段已转为专用变体
        FormatConstraint::Pattern { .. } | FormatConstraint::Email => None,
    }
}
