// ==========================================
// 会员名册导入查重引擎 - 批次编排器
// ==========================================
// 流程: 分块 → 校验 → 拉取既有记录 → 构建分块索引 → 查重 → 汇总
// 红线: 块与块顺序执行，块内并行但结果保持输入顺序
// 红线: 校验拒绝不会中止批次；既有记录源故障按重试策略处理
// ==========================================

use crate::config::{check_field_references, BatchConfig, ConfigError, RuntimeConfig};
use crate::domain::matching::{MatchingConfig, ResolutionResult};
use crate::domain::record::{AcceptedRecord, ExistingRecord, RawRow, ValidationOutcome};
use crate::domain::report::BatchReport;
use crate::domain::schema::Schema;
use crate::domain::types::BatchState;
use crate::engine::blocking_index::BlockingIndex;
use crate::engine::duplicate_resolver::DuplicateResolver;
use crate::engine::events::{CancellationFlag, OptionalProgressSink, ProgressSink};
use crate::engine::report_builder::ReportBuilder;
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::data_cleaner::normalize_blocking_key;
use crate::importer::error::ImportResult;
use crate::importer::importer_trait::{FileParser, RowValidator};
use crate::importer::record_validator::RecordValidator;
use crate::perf::{self, PerfGuard};
use crate::repository::{ExistingRecordSource, RepositoryError, RepositoryResult};
use futures::stream::{self, StreamExt, TryStreamExt};
use rayon::prelude::*;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

// ==========================================
// BatchOrchestrator - 批次编排器
// ==========================================

pub struct BatchOrchestrator<S>
where
    S: ExistingRecordSource,
{
    schema: Arc<Schema>,
    matching: Arc<MatchingConfig>,
    validator: Arc<dyn RowValidator>,
    resolver: Arc<DuplicateResolver>,
    batch: BatchConfig,
    source: Arc<S>,
    progress: OptionalProgressSink,
    cancellation: CancellationFlag,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl<S> BatchOrchestrator<S>
where
    S: ExistingRecordSource + 'static,
{
    /// 创建编排器实例
    ///
    /// # 参数
    /// - schema: 字段模式
    /// - matching: 查重配置
    /// - batch: 批次运行配置
    /// - source: 既有记录源
    ///
    /// # 返回
    /// - Err(Configuration): 配置不合法，批次不会启动
    pub fn new(
        schema: Schema,
        matching: MatchingConfig,
        batch: BatchConfig,
        source: Arc<S>,
    ) -> ImportResult<Self> {
        batch.validate()?;
        check_field_references(&schema, &matching, &batch)?;

        let pool = match batch.max_workers {
            Some(workers) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("roster-ingest-worker-{}", i))
                    .build()
                    .map_err(|e| ConfigError::ThreadPool(e.to_string()))?,
            )),
            None => None,
        };

        let schema = Arc::new(schema);
        let matching = Arc::new(matching);
        Ok(Self {
            validator: Arc::new(RecordValidator::new(Arc::clone(&schema))),
            resolver: Arc::new(DuplicateResolver::new(Arc::clone(&matching))),
            schema,
            matching,
            batch,
            source,
            progress: OptionalProgressSink::none(),
            cancellation: CancellationFlag::new(),
            pool,
        })
    }

    /// 由配置档转换结果创建
    pub fn from_runtime(runtime: RuntimeConfig, source: Arc<S>) -> ImportResult<Self> {
        Self::new(runtime.schema, runtime.matching, runtime.batch, source)
    }

    /// 替换行校验器（默认按模式校验）
    pub fn with_validator(mut self, validator: Arc<dyn RowValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// 注入进度接收者
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = OptionalProgressSink::with_sink(sink);
        self
    }

    /// 注入外部取消标志
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// 取消标志（克隆后与编排器共享）
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// 解析文件并运行批次
    pub async fn run_file(&self, parser: &dyn FileParser, path: &Path) -> ImportResult<BatchReport> {
        let rows = {
            let _perf = PerfGuard::new("parse_file");
            parser.parse_to_raw_rows(path)?
        };
        info!(path = %path.display(), rows = rows.len(), "输入文件解析完成");
        self.run(rows).await
    }

    /// 运行批次
    ///
    /// # 返回
    /// - Ok(BatchReport): 终态为 Completed / Aborted / Cancelled
    /// - Err: 块内工作线程失败等内部错误
    #[instrument(skip_all, fields(total = rows.len()))]
    pub async fn run(&self, rows: Vec<RawRow>) -> ImportResult<BatchReport> {
        let total = rows.len();
        let mut report = ReportBuilder::new(total);
        let batch_id = report.batch_id().to_string();

        info!(
            batch_id = %batch_id,
            total,
            chunk_size = self.batch.chunk_size,
            blocking_field = ?self.matching.blocking_field(),
            threshold = self.matching.threshold(),
            "开始批次导入查重"
        );

        let mut conflicts = self
            .batch
            .batch_identity_field
            .as_deref()
            .map(ConflictHandler::new);
        let mut full_scan_index: Option<Arc<BlockingIndex>> = None;
        let mut rows = rows.into_iter().peekable();
        let mut chunk_no = 0usize;

        while rows.peek().is_some() {
            if self.cancellation.is_cancelled() {
                report.transition(BatchState::Cancelled)?;
                let counts = report.counts();
                warn!(
                    batch_id = %batch_id,
                    processed = counts.processed,
                    total,
                    "批次已取消"
                );
                return Ok(report.finish());
            }

            chunk_no += 1;
            let chunk: Vec<RawRow> = rows.by_ref().take(self.batch.chunk_size).collect();
            let _perf = PerfGuard::new("process_chunk");

            // ===== 校验 =====
            report.transition(BatchState::Validating)?;
            let outcomes = self.validate_chunk(chunk).await?;
            let mut accepted = Vec::new();
            for outcome in outcomes {
                match outcome {
                    ValidationOutcome::Accepted(record) => accepted.push(record),
                    ValidationOutcome::Rejected(rejected) => report.record_rejected(rejected),
                }
            }

            if let Some(handler) = conflicts.as_mut() {
                for duplicate in handler.detect_duplicates(&accepted) {
                    debug!(
                        position = duplicate.position,
                        first_position = duplicate.first_position,
                        key = %duplicate.key,
                        "同批次重复行"
                    );
                    report.record_intra_batch_duplicate(duplicate);
                }
            }

            // ===== 查重 =====
            report.transition(BatchState::Resolving)?;
            let mut source_failure = None;
            if !accepted.is_empty() {
                match self.index_for_chunk(&accepted, &mut full_scan_index).await {
                    Ok(index) => {
                        for (record, result) in self.resolve_chunk(accepted, index).await? {
                            report.record_resolved(record, result);
                        }
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        warn!(
                            batch_id = %batch_id,
                            chunk = chunk_no,
                            records = accepted.len(),
                            error = %reason,
                            "既有记录源重试耗尽，本块记录标记为未完成查重"
                        );
                        for record in accepted {
                            report.record_unresolved(record, &reason);
                        }
                        source_failure = Some(reason);
                    }
                }
            }

            let counts = report.counts();
            debug!(
                batch_id = %batch_id,
                chunk = chunk_no,
                processed = counts.processed,
                accepted = counts.accepted,
                rejected = counts.rejected,
                unresolved = counts.unresolved,
                "块处理完成"
            );
            self.progress.notify(counts.processed, total);

            if let Some(reason) = source_failure {
                if self.batch.fail_fast_on_source_error {
                    report.abort(format!("既有记录源不可用（第 {} 块）: {}", chunk_no, reason))?;
                    warn!(batch_id = %batch_id, chunk = chunk_no, "批次已中止");
                    return Ok(report.finish());
                }
            }
        }

        report.transition(BatchState::Completed)?;
        let final_report = report.finish();
        info!(
            batch_id = %batch_id,
            total,
            accepted = final_report.counts.accepted,
            rejected = final_report.counts.rejected,
            flagged_duplicate = final_report.counts.flagged_duplicate,
            unresolved = final_report.counts.unresolved,
            intra_batch_duplicates = final_report.intra_batch_duplicates.len(),
            elapsed_ms = final_report.elapsed_ms,
            "批次导入查重完成"
        );
        Ok(final_report)
    }

    // ==========================================
    // 块内步骤
    // ==========================================

    /// 块内并行校验（结果保持输入顺序）
    async fn validate_chunk(&self, chunk: Vec<RawRow>) -> ImportResult<Vec<ValidationOutcome>> {
        let validator = Arc::clone(&self.validator);
        let pool = self.pool.clone();
        let outcomes = tokio::task::spawn_blocking(move || {
            let work = || {
                chunk
                    .par_iter()
                    .map(|row| validator.validate(row))
                    .collect::<Vec<_>>()
            };
            match pool {
                Some(pool) => pool.install(work),
                None => work(),
            }
        })
        .await?;
        Ok(outcomes)
    }

    /// 块内并行查重（结果保持输入顺序）
    async fn resolve_chunk(
        &self,
        records: Vec<AcceptedRecord>,
        index: Arc<BlockingIndex>,
    ) -> ImportResult<Vec<(AcceptedRecord, ResolutionResult)>> {
        let resolver = Arc::clone(&self.resolver);
        let pool = self.pool.clone();
        let resolved = tokio::task::spawn_blocking(move || {
            let work = || {
                records
                    .into_par_iter()
                    .map(|record| {
                        let result = resolver.resolve(&record, &index);
                        (record, result)
                    })
                    .collect::<Vec<_>>()
            };
            match pool {
                Some(pool) => pool.install(work),
                None => work(),
            }
        })
        .await?;
        Ok(resolved)
    }

    /// 为本块准备分块索引（既有记录按模式归一化）
    ///
    /// - 全量扫描: 首次成功拉取后整批复用
    /// - 分块模式: 按本块出现的分块键拉取对应桶
    async fn index_for_chunk(
        &self,
        accepted: &[AcceptedRecord],
        full_scan_index: &mut Option<Arc<BlockingIndex>>,
    ) -> RepositoryResult<Arc<BlockingIndex>> {
        let Some(field) = self.matching.blocking_field() else {
            if let Some(index) = full_scan_index {
                return Ok(Arc::clone(index));
            }
            let records = self
                .with_retry("fetch_all", || self.source.fetch_all())
                .await?;
            let index = Arc::new(BlockingIndex::build_with_schema(records, None, &self.schema));
            *full_scan_index = Some(Arc::clone(&index));
            return Ok(index);
        };

        let keys = distinct_blocking_keys(accepted, field);
        if keys.is_empty() {
            return Ok(Arc::new(BlockingIndex::build(Vec::new(), Some(field))));
        }

        let records = self
            .with_retry("fetch_by_blocking_value", || self.fetch_buckets(field, &keys))
            .await?;
        debug!(
            blocking_field = field,
            keys = keys.len(),
            records = records.len(),
            "本块既有记录拉取完成"
        );
        Ok(Arc::new(BlockingIndex::build_with_schema(
            records,
            Some(field),
            &self.schema,
        )))
    }

    /// 有界并发拉取多个分块（任一失败即整体失败）
    async fn fetch_buckets(
        &self,
        field: &str,
        keys: &[String],
    ) -> RepositoryResult<Vec<ExistingRecord>> {
        let buckets: Vec<Vec<ExistingRecord>> = stream::iter(keys.iter())
            .map(|key| self.source.fetch_by_blocking_value(field, key))
            .buffered(self.batch.max_concurrent_fetches)
            .try_collect()
            .await?;
        Ok(buckets.into_iter().flatten().collect())
    }

    /// 按批次配置重试既有记录源读取
    ///
    /// retry_attempts 为总尝试次数；不可重试的错误立即返回
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> RepositoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RepositoryResult<T>>,
    {
        let attempts = self.batch.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            let started = Instant::now();
            let result = attempt_fn().await;
            perf::record_fetch(op, started.elapsed());

            match result {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    warn!(
                        op,
                        attempt,
                        attempts,
                        backoff_ms = self.batch.retry_backoff_ms,
                        error = %err,
                        "既有记录源读取失败，准备重试"
                    );
                    tokio::time::sleep(self.batch.retry_backoff()).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(match err {
                        RepositoryError::SourceUnavailable(message) => {
                            RepositoryError::SourceUnavailable(format!(
                                "{}（已尝试 {} 次）",
                                message, attempt
                            ))
                        }
                        other => other,
                    })
                }
            }
        }
    }
}

/// 本块出现的分块键（归一化、去重，保持首次出现顺序）
fn distinct_blocking_keys(records: &[AcceptedRecord], field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.match_text(field))
        .filter_map(|v| normalize_blocking_key(&v))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::FieldWeight;
    use crate::domain::record::FieldValue;
    use crate::domain::schema::FieldSpec;
    use crate::domain::types::{FieldType, NormalizationStrategy};
    use crate::importer::error::ImportError;
    use crate::repository::InMemoryRecordSource;
    use std::collections::BTreeMap;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::new("name", FieldType::Text, true),
            FieldSpec::new("city", FieldType::Text, false),
        ])
        .unwrap()
    }

    fn matching(blocking: Option<&str>) -> MatchingConfig {
        MatchingConfig::new(
            vec![FieldWeight::new("name", 1.0, NormalizationStrategy::EditRatio)],
            0.8,
            blocking.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_distinct_blocking_keys_keeps_first_seen_order() {
        let record = |position: usize, city: &str| {
            let mut values = BTreeMap::new();
            values.insert("city".to_string(), FieldValue::Text(city.to_string()));
            AcceptedRecord { position, values }
        };
        let records = vec![
            record(1, "Oslo"),
            record(2, "Bergen"),
            record(3, " oslo "),
            AcceptedRecord {
                position: 4,
                values: BTreeMap::new(),
            },
        ];
        assert_eq!(distinct_blocking_keys(&records, "city"), vec!["oslo", "bergen"]);
    }

    #[test]
    fn test_new_rejects_invalid_batch_config() {
        let batch = BatchConfig {
            chunk_size: 0,
            ..BatchConfig::default()
        };
        let result = BatchOrchestrator::new(
            schema(),
            matching(None),
            batch,
            Arc::new(InMemoryRecordSource::default()),
        );
        assert!(matches!(result, Err(ImportError::Configuration(_))));
    }

    #[test]
    fn test_new_rejects_unknown_blocking_field() {
        let result = BatchOrchestrator::new(
            schema(),
            matching(Some("zip")),
            BatchConfig::default(),
            Arc::new(InMemoryRecordSource::default()),
        );
        assert!(matches!(result, Err(ImportError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let orchestrator = BatchOrchestrator::new(
            schema(),
            matching(None),
            BatchConfig::default(),
            Arc::new(InMemoryRecordSource::default()),
        )
        .unwrap();

        let report = orchestrator.run(Vec::new()).await.unwrap();
        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.counts.total, 0);
        assert!(report.counts.is_consistent());
    }

    struct RejectAll;

    impl RowValidator for RejectAll {
        fn validate(&self, row: &RawRow) -> ValidationOutcome {
            ValidationOutcome::Rejected(crate::domain::record::RejectedRow {
                row: row.clone(),
                violations: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_custom_validator_replaces_schema_validation() {
        let source = InMemoryRecordSource::new(vec![ExistingRecord::from_pairs(
            "E1",
            [("name", "Ada Lovelace")],
        )]);
        let orchestrator =
            BatchOrchestrator::new(schema(), matching(None), BatchConfig::default(), Arc::new(source))
                .unwrap()
                .with_validator(Arc::new(RejectAll));

        let report = orchestrator
            .run(vec![RawRow::from_pairs(1, [("name", "Ada Lovelace")])])
            .await
            .unwrap();

        assert_eq!(report.counts.rejected, 1);
        assert_eq!(report.counts.accepted, 0);
        assert!(report.resolutions.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_run_with_custom_pool() {
        let source = InMemoryRecordSource::new(vec![
            ExistingRecord::from_pairs("E1", [("name", "Ada Lovelace"), ("city", "London")]),
            ExistingRecord::from_pairs("E2", [("name", "Ada Lovelace"), ("city", "Paris")]),
        ]);
        let batch = BatchConfig {
            chunk_size: 1,
            max_workers: Some(2),
            ..BatchConfig::default()
        };
        let orchestrator =
            BatchOrchestrator::new(schema(), matching(Some("city")), batch, Arc::new(source))
                .unwrap();

        let rows = vec![
            RawRow::from_pairs(1, [("name", "Ada Lovelace"), ("city", "london")]),
            RawRow::from_pairs(2, [("name", "Ada Lovelace")]),
        ];
        let report = orchestrator.run(rows).await.unwrap();

        assert_eq!(report.counts.accepted, 2);
        assert_eq!(report.counts.flagged_duplicate, 1);
        let best = report.resolutions[0].outcome.result().and_then(|r| r.best());
        assert_eq!(best.map(|c| c.existing_id.as_str()), Some("E1"));
        // 无分块取值的记录没有候选
        assert!(!report.resolutions[1].outcome.is_duplicate());
    }
}
