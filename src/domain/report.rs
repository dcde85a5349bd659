// ==========================================
// 会员名册导入查重引擎 - 批次报告模型
// ==========================================
// 职责: BatchCounts / ResolutionOutcome / BatchReport
// 红线: BatchReport 返回后不可变；列表顺序与输入行顺序一致
// ==========================================

use crate::domain::matching::ResolutionResult;
use crate::domain::record::{AcceptedRecord, RejectedRow};
use crate::domain::types::BatchState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BatchCounts - 批次计数
// ==========================================
// 不变式:
// - accepted + unresolved + rejected = processed <= total
// - flagged_duplicate <= accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,             // 输入总行数
    pub processed: usize,         // 已处理行数
    pub accepted: usize,          // 校验通过且完成查重
    pub rejected: usize,          // 校验拒绝
    pub flagged_duplicate: usize, // 存在候选重复
    pub unresolved: usize,        // 校验通过但既有记录源不可用
}

impl BatchCounts {
    /// 计数是否自洽
    pub fn is_consistent(&self) -> bool {
        self.accepted + self.unresolved + self.rejected == self.processed
            && self.processed <= self.total
            && self.flagged_duplicate <= self.accepted
    }
}

// ==========================================
// ResolutionOutcome - 查重结局
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionOutcome {
    Resolved(ResolutionResult),
    UnresolvedDueToSourceFailure { reason: String },
}

impl ResolutionOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(r) if r.is_duplicate())
    }

    pub fn result(&self) -> Option<&ResolutionResult> {
        match self {
            ResolutionOutcome::Resolved(r) => Some(r),
            ResolutionOutcome::UnresolvedDueToSourceFailure { .. } => None,
        }
    }
}

// ==========================================
// ResolvedRecord - (记录, 查重结局) 对
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub record: AcceptedRecord,
    pub outcome: ResolutionOutcome,
}

// ==========================================
// IntraBatchDuplicate - 同批次内重复
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntraBatchDuplicate {
    pub position: usize,       // 重复行位置
    pub first_position: usize, // 首次出现的行位置
    pub field: String,         // 判重字段
    pub key: String,           // 归一化后的键值
}

// ==========================================
// BatchReport - 批次报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub state: BatchState,
    pub cancelled: bool,
    pub abort_reason: Option<String>,
    pub counts: BatchCounts,
    pub rejected: Vec<RejectedRow>,
    pub resolutions: Vec<ResolvedRecord>,
    pub intra_batch_duplicates: Vec<IntraBatchDuplicate>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// 被标记为疑似重复的记录
    pub fn flagged(&self) -> impl Iterator<Item = &ResolvedRecord> {
        self.resolutions.iter().filter(|r| r.outcome.is_duplicate())
    }

    /// 因既有记录源故障未完成查重的记录
    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedRecord> {
        self.resolutions.iter().filter(|r| {
            matches!(
                r.outcome,
                ResolutionOutcome::UnresolvedDueToSourceFailure { .. }
            )
        })
    }

    pub fn is_complete(&self) -> bool {
        self.state == BatchState::Completed
    }
}
