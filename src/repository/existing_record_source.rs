// ==========================================
// 会员名册导入查重引擎 - 既有记录源 Trait
// ==========================================
// 职责: 定义既有记录读取接口（不包含查重逻辑）
// 红线: 只读；实现者须支持并发读取
// ==========================================

use crate::domain::record::ExistingRecord;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ExistingRecordSource Trait
// ==========================================
// 用途: 查重比对对象的来源
// 实现者: InMemoryRecordSource / CsvRecordSource
#[async_trait]
pub trait ExistingRecordSource: Send + Sync {
    /// 按分块字段取值读取既有记录
    ///
    /// # 参数
    /// - field: 分块字段名
    /// - value: 归一化后的分块键（TRIM + 小写）
    ///
    /// # 返回
    /// - Ok(Vec<ExistingRecord>): 该分块键下的全部记录
    /// - Err(SourceUnavailable): 暂时不可用，调用方可重试
    async fn fetch_by_blocking_value(
        &self,
        field: &str,
        value: &str,
    ) -> RepositoryResult<Vec<ExistingRecord>>;

    /// 读取全部既有记录（未配置分块字段时使用）
    async fn fetch_all(&self) -> RepositoryResult<Vec<ExistingRecord>>;
}
