// ==========================================
// 会员名册导入查重引擎 - 重复判定
// ==========================================
// 职责: 分块查找候选 → 加权打分 → 阈值过滤 → 排序
// 红线: 纯函数；无可比字段时返回空结果，不报错
// ==========================================

use crate::domain::matching::{CandidateMatch, MatchingConfig, ResolutionResult};
use crate::domain::record::{AcceptedRecord, ExistingRecord};
use crate::domain::types::MissingFieldPolicy;
use crate::engine::blocking_index::BlockingIndex;
use crate::engine::similarity::similarity;
use crate::importer::data_cleaner::normalize_null;
use std::sync::Arc;

// ==========================================
// DuplicateResolver - 持有查重配置的判定器
// ==========================================
#[derive(Debug, Clone)]
pub struct DuplicateResolver {
    config: Arc<MatchingConfig>,
}

impl DuplicateResolver {
    pub fn new(config: Arc<MatchingConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn resolve(&self, record: &AcceptedRecord, index: &BlockingIndex) -> ResolutionResult {
        resolve(record, index, &self.config)
    }
}

/// 对单条已接受记录查重
///
/// # 返回
/// - 分数 ≥ threshold 的候选，按分数降序、ID 升序排列
pub fn resolve(
    record: &AcceptedRecord,
    index: &BlockingIndex,
    config: &MatchingConfig,
) -> ResolutionResult {
    let blocking_value = config
        .blocking_field()
        .and_then(|field| record.match_text(field));

    let candidates = index
        .lookup(blocking_value.as_deref())
        .iter()
        .filter_map(|existing| score_candidate(record, existing, config))
        .filter(|candidate| candidate.score >= config.threshold())
        .collect();

    ResolutionResult::from_candidates(candidates)
}

/// 计算加权分数 score = Σ(w·s) / Σw
///
/// # 缺失值
/// - 两侧都缺失: 字段不参与
/// - 单侧缺失: 按 MissingFieldPolicy（计为不匹配 / 忽略字段）
///
/// # 返回
/// - None: 没有任何可比字段（分母为 0）
pub fn score_candidate(
    record: &AcceptedRecord,
    existing: &ExistingRecord,
    config: &MatchingConfig,
) -> Option<CandidateMatch> {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut matched_fields = Vec::new();

    for fw in config.weights() {
        let incoming = record.match_text(&fw.field);
        let incoming = normalize_null(incoming.as_deref());
        let stored = normalize_null(existing.get(&fw.field));

        match (incoming, stored) {
            (None, None) => continue,
            (Some(_), None) | (None, Some(_)) => {
                if config.missing_field_policy() == MissingFieldPolicy::CountAsMismatch {
                    weight_total += fw.weight;
                }
            }
            (Some(a), Some(b)) => {
                let s = similarity(a, b, fw.strategy);
                weighted_sum += fw.weight * s;
                weight_total += fw.weight;
                if s >= config.field_match_floor() {
                    matched_fields.push(fw.field.clone());
                }
            }
        }
    }

    if weight_total <= 0.0 {
        return None;
    }

    Some(CandidateMatch {
        existing_id: existing.id.clone(),
        score: (weighted_sum / weight_total).clamp(0.0, 1.0),
        matched_fields,
    })
}
