// ==========================================
// 会员名册导入查重引擎 - 数据清洗
// ==========================================
// 职责: TRIM / NULL 标准化 / 电话数字化 / 邮箱小写 / 日期与数值解析
// 说明: 校验器与相似度打分共用同一套归一化
// ==========================================

use chrono::NaiveDate;

/// 可接受的日期格式（按顺序尝试）
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// 清洗文本字段（TRIM，可选转小写）
pub fn clean_text(value: &str, lowercase: bool) -> String {
    let trimmed = value.trim();
    if lowercase {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// 标准化 NULL 值（空字符串/空白 → None）
pub fn normalize_null(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 电话号码: 仅保留数字
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 邮箱: TRIM + 小写
pub fn normalize_email(value: &str) -> String {
    clean_text(value, true)
}

/// 分块键: TRIM 后按 日期 → 数值 → 小写文本 的顺序归一化，空值返回 None
///
/// 原始写法与校验后的规范写法得到同一个键（"03/15/2024" 与 "2024-03-15"，
/// "1,250.00" 与 "1250"），既有记录源无需知道字段类型也能按键取桶
pub fn normalize_blocking_key(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(date) = parse_date(trimmed) {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Some(number) = parse_numeric(trimmed) {
        return Some(number.to_string());
    }
    Some(trimmed.to_lowercase())
}

/// 解析日期（依次尝试 YYYY-MM-DD / YYYYMMDD / MM/DD/YYYY）
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// 解析数值（允许千分位逗号，必须为有限值）
pub fn parse_numeric(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
