// ==========================================
// 会员名册导入查重引擎 - 批次报告构建器
// ==========================================
// 职责: 逐块累积计数与结果，维护批次状态机，最终一次性产出报告
// 红线: 状态只能按允许的转换前进；finish 消耗构建器
// ==========================================

use crate::domain::matching::ResolutionResult;
use crate::domain::record::{AcceptedRecord, RejectedRow};
use crate::domain::report::{
    BatchCounts, BatchReport, IntraBatchDuplicate, ResolutionOutcome, ResolvedRecord,
};
use crate::domain::types::BatchState;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub struct ReportBuilder {
    batch_id: String,
    state: BatchState,
    abort_reason: Option<String>,
    counts: BatchCounts,
    rejected: Vec<RejectedRow>,
    resolutions: Vec<ResolvedRecord>,
    intra_batch_duplicates: Vec<IntraBatchDuplicate>,
    started_at: DateTime<Utc>,
    start: Instant,
}

impl ReportBuilder {
    pub fn new(total: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            state: BatchState::Idle,
            abort_reason: None,
            counts: BatchCounts {
                total,
                ..BatchCounts::default()
            },
            rejected: Vec::new(),
            resolutions: Vec::new(),
            intra_batch_duplicates: Vec::new(),
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn counts(&self) -> BatchCounts {
        self.counts
    }

    /// 状态转换（非法转换返回 InvalidStateTransition）
    pub fn transition(&mut self, next: BatchState) -> ImportResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ImportError::InvalidStateTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(batch_id = %self.batch_id, from = %self.state, to = %next, "批次状态转换");
        self.state = next;
        Ok(())
    }

    pub fn record_rejected(&mut self, rejected: RejectedRow) {
        self.counts.processed += 1;
        self.counts.rejected += 1;
        self.rejected.push(rejected);
    }

    pub fn record_resolved(&mut self, record: AcceptedRecord, result: ResolutionResult) {
        self.counts.processed += 1;
        self.counts.accepted += 1;
        if result.is_duplicate() {
            self.counts.flagged_duplicate += 1;
        }
        self.resolutions.push(ResolvedRecord {
            record,
            outcome: ResolutionOutcome::Resolved(result),
        });
    }

    pub fn record_unresolved(&mut self, record: AcceptedRecord, reason: &str) {
        self.counts.processed += 1;
        self.counts.unresolved += 1;
        self.resolutions.push(ResolvedRecord {
            record,
            outcome: ResolutionOutcome::UnresolvedDueToSourceFailure {
                reason: reason.to_string(),
            },
        });
    }

    /// 同批次重复只登记，不改变计数
    pub fn record_intra_batch_duplicate(&mut self, duplicate: IntraBatchDuplicate) {
        self.intra_batch_duplicates.push(duplicate);
    }

    pub fn abort(&mut self, reason: impl Into<String>) -> ImportResult<()> {
        self.transition(BatchState::Aborted)?;
        self.abort_reason = Some(reason.into());
        Ok(())
    }

    /// 产出最终报告
    pub fn finish(self) -> BatchReport {
        let finished_at = Utc::now();
        BatchReport {
            batch_id: self.batch_id,
            cancelled: self.state == BatchState::Cancelled,
            state: self.state,
            abort_reason: self.abort_reason,
            counts: self.counts,
            rejected: self.rejected,
            resolutions: self.resolutions,
            intra_batch_duplicates: self.intra_batch_duplicates,
            started_at: self.started_at,
            finished_at,
            elapsed_ms: self.start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::CandidateMatch;
    use crate::domain::record::RawRow;
    use std::collections::BTreeMap;

    fn accepted(position: usize) -> AcceptedRecord {
        AcceptedRecord {
            position,
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn test_counts_stay_consistent() {
        let mut builder = ReportBuilder::new(4);
        builder.transition(BatchState::Validating).unwrap();
        builder.transition(BatchState::Resolving).unwrap();

        builder.record_rejected(RejectedRow {
            row: RawRow::from_pairs(1, [("a", "")]),
            violations: Vec::new(),
        });
        builder.record_resolved(accepted(2), ResolutionResult::default());
        builder.record_resolved(
            accepted(3),
            ResolutionResult::from_candidates(vec![CandidateMatch {
                existing_id: "E1".to_string(),
                score: 0.9,
                matched_fields: Vec::new(),
            }]),
        );
        builder.record_unresolved(accepted(4), "timeout");
        builder.transition(BatchState::Completed).unwrap();

        let report = builder.finish();
        assert_eq!(report.counts.processed, 4);
        assert_eq!(report.counts.accepted, 2);
        assert_eq!(report.counts.flagged_duplicate, 1);
        assert_eq!(report.counts.unresolved, 1);
        assert!(report.counts.is_consistent());
        assert!(report.is_complete());
        assert!(!report.cancelled);
        assert_eq!(report.unresolved().count(), 1);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut builder = ReportBuilder::new(1);
        assert!(matches!(
            builder.transition(BatchState::Resolving),
            Err(ImportError::InvalidStateTransition { .. })
        ));
        assert_eq!(builder.state(), BatchState::Idle);
    }

    #[test]
    fn test_abort_and_cancel() {
        let mut builder = ReportBuilder::new(2);
        builder.transition(BatchState::Validating).unwrap();
        builder.abort("source down").unwrap();
        let report = builder.finish();
        assert_eq!(report.state, BatchState::Aborted);
        assert_eq!(report.abort_reason.as_deref(), Some("source down"));

        let mut builder = ReportBuilder::new(2);
        builder.transition(BatchState::Cancelled).unwrap();
        let report = builder.finish();
        assert!(report.cancelled);
        assert_eq!(report.counts.processed, 0);
    }
}
