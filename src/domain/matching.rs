// ==========================================
// 会员名册导入查重引擎 - 查重配置与结果模型
// ==========================================
// 职责: FieldWeight / MatchingConfig / CandidateMatch / ResolutionResult
// 红线: MatchingConfig 每次运行提供一次，运行期间不可变
// ==========================================

use crate::config::error::ConfigError;
use crate::domain::types::{MissingFieldPolicy, NormalizationStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

// ==========================================
// FieldWeight - 字段权重
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeight {
    pub field: String,
    pub weight: f64,
    pub strategy: NormalizationStrategy,
}

impl FieldWeight {
    pub fn new(field: impl Into<String>, weight: f64, strategy: NormalizationStrategy) -> Self {
        Self {
            field: field.into(),
            weight,
            strategy,
        }
    }
}

// ==========================================
// MatchingConfig - 查重配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatchingConfigFields")]
pub struct MatchingConfig {
    weights: Vec<FieldWeight>,
    threshold: f64,
    blocking_field: Option<String>,
    field_match_floor: f64,
    missing_field_policy: MissingFieldPolicy,
}

impl MatchingConfig {
    /// 创建并校验查重配置
    ///
    /// # 参数
    /// - weights: 字段权重列表（非空，权重非负且总和为正）
    /// - threshold: 候选阈值，取值 (0, 1]
    /// - blocking_field: 分块字段（None = 全量扫描）
    ///
    /// # 默认
    /// - field_match_floor = threshold
    /// - missing_field_policy = CountAsMismatch
    pub fn new(
        weights: Vec<FieldWeight>,
        threshold: f64,
        blocking_field: Option<String>,
    ) -> Result<Self, ConfigError> {
        if weights.is_empty() {
            return Err(ConfigError::EmptyWeights);
        }
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ConfigError::ThresholdOutOfRange(threshold));
        }

        let mut seen = HashSet::new();
        let mut total = 0.0;
        for w in &weights {
            if w.field.trim().is_empty() {
                return Err(ConfigError::EmptyFieldName);
            }
            if !w.weight.is_finite() || w.weight < 0.0 {
                return Err(ConfigError::NegativeWeight {
                    field: w.field.clone(),
                    weight: w.weight,
                });
            }
            if !seen.insert(w.field.as_str()) {
                return Err(ConfigError::DuplicateField(w.field.clone()));
            }
            total += w.weight;
        }
        if total <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight);
        }

        let blocking_field = blocking_field
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        Ok(Self {
            weights,
            threshold,
            blocking_field,
            field_match_floor: threshold,
            missing_field_policy: MissingFieldPolicy::default(),
        })
    }

    /// 设置单字段命中下限（取值 [0, 1]）
    pub fn with_field_match_floor(mut self, floor: f64) -> Result<Self, ConfigError> {
        if !floor.is_finite() || !(0.0..=1.0).contains(&floor) {
            return Err(ConfigError::FieldFloorOutOfRange(floor));
        }
        self.field_match_floor = floor;
        Ok(self)
    }

    pub fn with_missing_field_policy(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_field_policy = policy;
        self
    }

    pub fn weights(&self) -> &[FieldWeight] {
        &self.weights
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn blocking_field(&self) -> Option<&str> {
        self.blocking_field.as_deref()
    }

    pub fn field_match_floor(&self) -> f64 {
        self.field_match_floor
    }

    pub fn missing_field_policy(&self) -> MissingFieldPolicy {
        self.missing_field_policy
    }
}

// 反序列化中转结构，经 MatchingConfig::new 校验后转换
#[derive(Deserialize)]
struct MatchingConfigFields {
    weights: Vec<FieldWeight>,
    threshold: f64,
    blocking_field: Option<String>,
    field_match_floor: Option<f64>,
    #[serde(default)]
    missing_field_policy: MissingFieldPolicy,
}

impl TryFrom<MatchingConfigFields> for MatchingConfig {
    type Error = ConfigError;

    fn try_from(fields: MatchingConfigFields) -> Result<Self, Self::Error> {
        let config = MatchingConfig::new(fields.weights, fields.threshold, fields.blocking_field)?
            .with_missing_field_policy(fields.missing_field_policy);
        match fields.field_match_floor {
            Some(floor) => config.with_field_match_floor(floor),
            None => Ok(config),
        }
    }
}

// ==========================================
// CandidateMatch - 候选重复记录
// ==========================================
// 每次比对新建，不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub existing_id: String,
    pub score: f64,
    pub matched_fields: Vec<String>, // 单字段相似度达到下限的字段（按权重配置顺序）
}

impl CandidateMatch {
    /// 排序规则: score 降序，score 相同按 existing_id 升序
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.existing_id.cmp(&other.existing_id))
    }
}

// ==========================================
// ResolutionResult - 单条记录的查重结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub candidates: Vec<CandidateMatch>,
}

impl ResolutionResult {
    /// 由未排序候选构造（内部排序）
    pub fn from_candidates(mut candidates: Vec<CandidateMatch>) -> Self {
        candidates.sort_by(CandidateMatch::rank_cmp);
        Self { candidates }
    }

    pub fn is_duplicate(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn best(&self) -> Option<&CandidateMatch> {
        self.candidates.first()
    }
}
