// ==========================================
// 会员名册导入查重引擎 - 相似度打分
// ==========================================
// 职责: 按归一化策略计算两个值的相似度，结果 ∈ [0, 1]
// 红线: 纯函数，确定性；编辑距离按 Unicode 标量值计
// ==========================================

use crate::domain::types::NormalizationStrategy;
use crate::importer::data_cleaner::{clean_text, normalize_email, normalize_phone};

/// 计算两个值的相似度
///
/// # 策略
/// - exact: TRIM 后忽略大小写相等为 1.0，否则 0.0
/// - edit-ratio: 1 - levenshtein(a, b) / max(len a, len b)（均为小写 TRIM 后）
/// - phone: 仅保留数字后精确比较；任一侧没有数字时按 TRIM 小写原文精确比较
/// - email: 小写 TRIM 后精确比较
pub fn similarity(a: &str, b: &str, strategy: NormalizationStrategy) -> f64 {
    match strategy {
        NormalizationStrategy::Exact => exact(&clean_text(a, true), &clean_text(b, true)),
        NormalizationStrategy::EditRatio => edit_ratio(a, b),
        NormalizationStrategy::Phone => {
            let (da, db) = (normalize_phone(a), normalize_phone(b));
            if da.is_empty() || db.is_empty() {
                // 无数字可比时退化为原文比较
                exact(&clean_text(a, true), &clean_text(b, true))
            } else {
                exact(&da, &db)
            }
        }
        NormalizationStrategy::Email => exact(&normalize_email(a), &normalize_email(b)),
    }
}

/// 编辑距离比率
pub fn edit_ratio(a: &str, b: &str) -> f64 {
    let a = clean_text(a, true);
    let b = clean_text(b, true);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
}

fn exact(a: &str, b: &str) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}
