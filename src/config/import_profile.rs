// ==========================================
// 会员名册导入查重引擎 - 导入配置档
// ==========================================
// 职责: 从 JSON 配置档加载 模式 + 查重配置 + 批次配置
// 存储: 单个 JSON 文件（schema / matching / batch 三段）
// ==========================================

use crate::config::batch_config::BatchConfig;
use crate::config::error::ConfigError;
use crate::domain::matching::{FieldWeight, MatchingConfig};
use crate::domain::schema::{FieldSpec, Schema};
use crate::domain::types::{MissingFieldPolicy, NormalizationStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

// ==========================================
// 配置档原始结构（与文件一一对应）
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeightEntry {
    pub field: String,
    pub weight: f64,
    /// 归一化策略标签（exact / edit-ratio / phone / email）
    pub normalization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingSection {
    pub weights: Vec<FieldWeightEntry>,
    pub threshold: f64,
    pub blocking_field: Option<String>,
    #[serde(default)]
    pub field_match_floor: Option<f64>,
    #[serde(default)]
    pub missing_field_policy: MissingFieldPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProfile {
    pub schema: Vec<FieldSpec>,
    pub matching: MatchingSection,
    pub batch: BatchConfig,
}

// ==========================================
// RuntimeConfig - 校验后的运行期配置
// ==========================================
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub schema: Schema,
    pub matching: MatchingConfig,
    pub batch: BatchConfig,
}

impl ImportProfile {
    /// 从 JSON 文件加载配置档
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), "加载导入配置档");
        Self::from_json_str(&raw)
    }

    /// 从 JSON 字符串解析配置档
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// 配置快照（JSON 字符串，用于审计记录）
    pub fn snapshot(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// 校验并转换为运行期配置
    ///
    /// # 校验项
    /// 1. 模式: 字段名、正则、枚举取值
    /// 2. 查重: 权重、阈值、策略标签
    /// 3. 引用: 权重字段 / 分块字段 / 判重字段必须存在于模式
    /// 4. 批次: 分块大小、重试次数、并行度
    pub fn into_runtime(self) -> Result<RuntimeConfig, ConfigError> {
        let schema = Schema::new(self.schema)?;

        let mut weights = Vec::with_capacity(self.matching.weights.len());
        for entry in self.matching.weights {
            let strategy: NormalizationStrategy =
                entry
                    .normalization
                    .parse()
                    .map_err(|tag| ConfigError::UnknownNormalization {
                        field: entry.field.clone(),
                        tag,
                    })?;
            weights.push(FieldWeight::new(entry.field, entry.weight, strategy));
        }

        let mut matching = MatchingConfig::new(
            weights,
            self.matching.threshold,
            self.matching.blocking_field,
        )?
        .with_missing_field_policy(self.matching.missing_field_policy);
        if let Some(floor) = self.matching.field_match_floor {
            matching = matching.with_field_match_floor(floor)?;
        }

        self.batch.validate()?;
        check_field_references(&schema, &matching, &self.batch)?;

        debug!(
            fields = schema.len(),
            weights = matching.weights().len(),
            threshold = matching.threshold(),
            blocking_field = ?matching.blocking_field(),
            "导入配置档校验通过"
        );

        Ok(RuntimeConfig {
            schema,
            matching,
            batch: self.batch,
        })
    }
}

/// 校验配置中引用的字段均在模式内
pub fn check_field_references(
    schema: &Schema,
    matching: &MatchingConfig,
    batch: &BatchConfig,
) -> Result<(), ConfigError> {
    for w in matching.weights() {
        if !schema.contains(&w.field) {
            return Err(ConfigError::UnknownField {
                usage: "weights".to_string(),
                field: w.field.clone(),
            });
        }
    }
    if let Some(field) = matching.blocking_field() {
        if !schema.contains(field) {
            return Err(ConfigError::UnknownField {
                usage: "blocking_field".to_string(),
                field: field.to_string(),
            });
        }
    }
    if let Some(field) = batch.batch_identity_field.as_deref() {
        if !schema.contains(field) {
            return Err(ConfigError::UnknownField {
                usage: "batch_identity_field".to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}
