// ==========================================
// 会员名册导入查重引擎 - 命令行入口
// ==========================================
// 用法: roster-ingest --profile profile.json --input roster.csv [--existing members.csv]
// 输出: 批次报告 JSON（stdout 或 --output 指定文件）
// ==========================================

use anyhow::{bail, Context, Result};
use clap::Parser;
use roster_ingest::config::ImportProfile;
use roster_ingest::engine::{BatchOrchestrator, TracingProgressSink};
use roster_ingest::importer::CsvParser;
use roster_ingest::repository::{CsvRecordSource, InMemoryRecordSource};
use roster_ingest::{logging, BatchReport, BatchState, ExistingRecordSource};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "会员名册批量导入与模糊查重", long_about = None)]
struct Cli {
    /// 导入配置档（JSON: schema / matching / batch）
    #[arg(long)]
    profile: PathBuf,

    /// 待导入名册文件（.csv / .tsv / .txt）
    #[arg(long)]
    input: PathBuf,

    /// 既有记录文件（缺省时视为空库）
    #[arg(long)]
    existing: Option<PathBuf>,

    /// 既有记录文件中的 ID 列
    #[arg(long, default_value = "id")]
    id_column: String,

    /// 报告输出文件（缺省输出到 stdout）
    #[arg(long)]
    output: Option<PathBuf>,

    /// 字段分隔符（单个 ASCII 字符；缺省按扩展名推断）
    #[arg(long, value_parser = parse_delimiter)]
    delimiter: Option<u8>,

    /// 覆盖配置档中的分块大小
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 以 JSON 行输出日志
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    tracing::info!("==================================================");
    tracing::info!("{} v{}", roster_ingest::APP_NAME, roster_ingest::VERSION);
    tracing::info!("==================================================");

    let mut profile = ImportProfile::from_json_file(&cli.profile)
        .with_context(|| format!("无法加载配置档 {}", cli.profile.display()))?;
    if let Some(chunk_size) = cli.chunk_size {
        profile.batch.chunk_size = chunk_size;
    }
    let runtime = profile.into_runtime().context("配置档校验失败")?;

    let report = match &cli.existing {
        Some(path) => {
            let source = CsvRecordSource::load(path, &cli.id_column)
                .with_context(|| format!("无法加载既有记录 {}", path.display()))?;
            run_batch(runtime, Arc::new(source), &cli).await?
        }
        None => {
            tracing::warn!("未指定既有记录文件，按空库查重");
            run_batch(runtime, Arc::new(InMemoryRecordSource::default()), &cli).await?
        }
    };

    let json = serde_json::to_string_pretty(&report).context("报告序列化失败")?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("无法写入报告 {}", path.display()))?;
            tracing::info!(path = %path.display(), "报告已写入");
        }
        None => println!("{}", json),
    }

    if report.state == BatchState::Aborted {
        bail!(
            "批次已中止: {}",
            report.abort_reason.as_deref().unwrap_or("未知原因")
        );
    }
    Ok(())
}

async fn run_batch<S>(
    runtime: roster_ingest::RuntimeConfig,
    source: Arc<S>,
    cli: &Cli,
) -> Result<BatchReport>
where
    S: ExistingRecordSource + 'static,
{
    let orchestrator = BatchOrchestrator::from_runtime(runtime, source)?
        .with_progress_sink(Arc::new(TracingProgressSink));

    // Ctrl-C 在下一个块边界取消批次
    let flag = orchestrator.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，将在当前块结束后取消批次");
            flag.cancel();
        }
    });

    let parser = match cli.delimiter {
        Some(delimiter) => CsvParser::with_delimiter(delimiter),
        None => CsvParser::new(),
    };
    let report = orchestrator
        .run_file(&parser, &cli.input)
        .await
        .with_context(|| format!("批次运行失败 {}", cli.input.display()))?;
    Ok(report)
}

fn parse_delimiter(raw: &str) -> Result<u8, String> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match raw.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(format!("分隔符必须是单个 ASCII 字符: {}", raw)),
        },
    }
}
