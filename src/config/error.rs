// ==========================================
// 会员名册导入查重引擎 - 配置错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 配置错误在处理任何行之前抛出，批次不启动
// ==========================================

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    // ===== 模式定义错误 =====
    #[error("字段名为空")]
    EmptyFieldName,

    #[error("字段重复定义: {0}")]
    DuplicateField(String),

    #[error("枚举字段缺少 one-of 取值集合: {0}")]
    EnumerationWithoutValues(String),

    #[error("字段约束非法 (字段 {field}): {message}")]
    InvalidConstraint { field: String, message: String },

    // ===== 查重配置错误 =====
    #[error("字段权重列表为空")]
    EmptyWeights,

    #[error("相似度阈值超出 (0, 1]: {0}")]
    ThresholdOutOfRange(f64),

    #[error("字段权重非法 (字段 {field}): {weight}")]
    NegativeWeight { field: String, weight: f64 },

    #[error("字段权重总和必须大于 0")]
    ZeroTotalWeight,

    #[error("单字段命中下限超出 [0, 1]: {0}")]
    FieldFloorOutOfRange(f64),

    #[error("未知归一化策略 (字段 {field}): {tag}")]
    UnknownNormalization { field: String, tag: String },

    #[error("引用了模式中不存在的字段 ({usage}): {field}")]
    UnknownField { usage: String, field: String },

    // ===== 批次配置错误 =====
    #[error("分块大小必须大于 0")]
    InvalidChunkSize,

    #[error("重试次数必须至少为 1")]
    InvalidRetryAttempts,

    #[error("工作线程数必须大于 0")]
    InvalidWorkerCount,

    #[error("并发拉取数必须大于 0")]
    InvalidFetchConcurrency,

    #[error("线程池创建失败: {0}")]
    ThreadPool(String),

    // ===== 配置文件错误 =====
    #[error("配置文件读取失败 ({path}): {message}")]
    ProfileRead { path: String, message: String },

    #[error("配置文件格式错误: {0}")]
    ProfileParse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ProfileParse(err.to_string())
    }
}
