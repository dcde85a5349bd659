// ==========================================
// 会员名册导入查重引擎 - 导入字段模式
// ==========================================
// 职责: FieldSpec / FormatConstraint 定义 + Schema 编译
// 说明: 约束以带标签的枚举描述，正则在构建 Schema 时一次性编译
// ==========================================

use crate::config::error::ConfigError;
use crate::domain::types::FieldType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// 邮箱格式（宽松校验，仅排除明显错误）
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

// ==========================================
// FormatConstraint - 格式约束
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum FormatConstraint {
    /// 正则匹配（对去空白后的值）
    Pattern { regex: String },
    /// 枚举集合（大小写不敏感）
    OneOf { values: Vec<String> },
    /// 最小字符数
    MinLength { min: usize },
    /// 最大字符数
    MaxLength { max: usize },
    /// 数值范围（闭区间）
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// 邮箱格式
    Email,
    /// 电话号码：去掉非数字字符后的位数范围
    Phone { min_digits: usize, max_digits: usize },
}

impl FormatConstraint {
    /// 约束的可读描述（写入违规记录的 constraint 字段）
    pub fn describe(&self) -> String {
        match self {
            FormatConstraint::Pattern { regex } => format!("pattern({})", regex),
            FormatConstraint::OneOf { values } => format!("one-of({})", values.join("|")),
            FormatConstraint::MinLength { min } => format!("min-length({})", min),
            FormatConstraint::MaxLength { max } => format!("max-length({})", max),
            FormatConstraint::Range { min, max } => {
                let lo = min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string());
                let hi = max.map(|v| v.to_string()).unwrap_or_else(|| "+inf".to_string());
                format!("range[{}, {}]", lo, hi)
            }
            FormatConstraint::Email => "email".to_string(),
            FormatConstraint::Phone {
                min_digits,
                max_digits,
            } => format!("phone({}..={} digits)", min_digits, max_digits),
        }
    }
}

// ==========================================
// FieldSpec - 字段规格
// ==========================================
// 生命周期: 每个导入模式定义一次，运行期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub constraints: Vec<FormatConstraint>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: FormatConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// 枚举字段的允许取值（取第一个 OneOf 约束）
    pub fn allowed_values(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|c| match c {
            FormatConstraint::OneOf { values } => Some(values.as_slice()),
            _ => None,
        })
    }
}

// ==========================================
// CompiledConstraint - 编译后的约束
// ==========================================
#[derive(Debug, Clone)]
pub enum CompiledConstraint {
    Pattern { source: FormatConstraint, regex: Regex },
    Email { source: FormatConstraint, regex: Regex },
    Plain(FormatConstraint),
}

impl CompiledConstraint {
    pub fn source(&self) -> &FormatConstraint {
        match self {
            CompiledConstraint::Pattern { source, .. } => source,
            CompiledConstraint::Email { source, .. } => source,
            CompiledConstraint::Plain(source) => source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledField {
    pub spec: FieldSpec,
    pub constraints: Vec<CompiledConstraint>,
}

// ==========================================
// Schema - 有序字段规格集合
// ==========================================
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<CompiledField>,
}

impl Schema {
    /// 构建并校验导入模式
    ///
    /// # 错误
    /// - 字段名为空 / 重复
    /// - 正则无法编译
    /// - 枚举字段缺少 one-of 取值集合
    /// - 长度/范围/位数上下界颠倒
    pub fn new(specs: Vec<FieldSpec>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(specs.len());

        for spec in specs {
            let name = spec.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptyFieldName);
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateField(name));
            }

            if spec.field_type == FieldType::Enumeration
                && spec.allowed_values().map_or(true, |v| v.is_empty())
            {
                return Err(ConfigError::EnumerationWithoutValues(name));
            }

            let mut constraints = Vec::with_capacity(spec.constraints.len());
            for constraint in &spec.constraints {
                constraints.push(compile_constraint(&name, constraint)?);
            }

            fields.push(CompiledField {
                spec: FieldSpec { name, ..spec },
                constraints,
            });
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .map(|f| &f.spec)
            .find(|spec| spec.name == name)
    }

    pub fn compiled_field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.spec.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn compile_constraint(
    field: &str,
    constraint: &FormatConstraint,
) -> Result<CompiledConstraint, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidConstraint {
        field: field.to_string(),
        message,
    };

    match constraint {
        FormatConstraint::Pattern { regex } => {
            let compiled = Regex::new(regex).map_err(|e| invalid(e.to_string()))?;
            Ok(CompiledConstraint::Pattern {
                source: constraint.clone(),
                regex: compiled,
            })
        }
        FormatConstraint::Email => {
            let compiled = Regex::new(EMAIL_PATTERN).map_err(|e| invalid(e.to_string()))?;
            Ok(CompiledConstraint::Email {
                source: constraint.clone(),
                regex: compiled,
            })
        }
        FormatConstraint::OneOf { values } if values.is_empty() => {
            Err(invalid("one-of 取值集合为空".to_string()))
        }
        FormatConstraint::Range {
            min: Some(lo),
            max: Some(hi),
        } if lo > hi => Err(invalid(format!("range 下界 {} 大于上界 {}", lo, hi))),
        FormatConstraint::Phone {
            min_digits,
            max_digits,
        } if min_digits > max_digits => Err(invalid(format!(
            "phone 位数下界 {} 大于上界 {}",
            min_digits, max_digits
        ))),
        _ => Ok(CompiledConstraint::Plain(constraint.clone())),
    }
}
