//! Scout CLI: ingest CI logs and inspect what was stored.
//!
//! Usage:
//!   scout sync [--workflow NAME] [--last N | case selectors] [--skip-*]
//!   scout parse [--workflow NAME] [--last N | case selectors]
//!   scout show --workflow NAME (--run-id ID | --run-number N) (--job-id ID | --action NAME)
//!   scout list [--workflow NAME] [--limit N]

use clap::{Args, Parser, Subcommand};
use scout::case::resolve_case;
use scout::logging::init_logging;
use scout::{
    collect_insights, AnalysisStore, BatchSelector, BatchSummary, CaseIdentifier, ExecutionStore, IncrementalSync,
    InsightOptions, Insights, LocalLogProvider, OpenStore, PipelineOrchestrator, ScoutConfig, SqliteStore,
    StageSkipSet,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "scout", version, about = "CI log ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Root of the downloaded log directory
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, store and parse CI logs
    Sync {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        skips: SkipFlags,
        /// Fetch again even when the raw log is already stored
        #[arg(long)]
        force_download: bool,
        /// Parse again even when the case is already parsed
        #[arg(long)]
        force_parse: bool,
        /// Cases processed at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Print the batch summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-parse stored raw logs without fetching
    Parse {
        #[command(flatten)]
        selection: Selection,
        /// Print the batch summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored record and analyses for one case
    Show {
        #[command(flatten)]
        case: CaseArgs,
    },
    /// Report flaky tests and recurring failures from stored analyses
    Insights {
        /// Only this workflow
        #[arg(long)]
        workflow: Option<String>,
        /// Cases a test must appear in to be judged flaky
        #[arg(long)]
        min_runs: Option<usize>,
        /// Flaky when the failure rate is within [T, 1 - T]
        #[arg(long)]
        threshold: Option<f64>,
        /// Failing cases before a failure counts as recurring
        #[arg(long)]
        min_occurrences: Option<usize>,
        /// Most recent analyses to read
        #[arg(long)]
        window: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// List recently stored executions
    List {
        /// Only this workflow
        #[arg(long)]
        workflow: Option<String>,
        /// Maximum rows
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args)]
struct CaseArgs {
    /// Workflow name
    #[arg(long)]
    workflow: Option<String>,
    #[arg(long)]
    run_id: Option<i64>,
    #[arg(long)]
    run_number: Option<i64>,
    #[arg(long)]
    job_id: Option<String>,
    /// Human-readable job name
    #[arg(long)]
    action: Option<String>,
}

impl CaseArgs {
    fn names_case(&self) -> bool {
        self.run_id.is_some() || self.run_number.is_some() || self.job_id.is_some() || self.action.is_some()
    }

    fn to_case(&self) -> Result<CaseIdentifier, String> {
        CaseIdentifier::new(
            self.workflow.clone().unwrap_or_default(),
            self.run_id,
            self.run_number,
            self.job_id.clone(),
            self.action.clone(),
        )
        .map_err(|e| e.to_string())
    }
}

#[derive(Args)]
struct Selection {
    #[command(flatten)]
    case: CaseArgs,
    /// Only the N most recent cases
    #[arg(long, conflicts_with_all = ["run_id", "run_number", "job_id", "action"])]
    last: Option<usize>,
}

impl Selection {
    fn to_selector(&self) -> Result<BatchSelector, String> {
        if self.case.names_case() {
            return self.case.to_case().map(BatchSelector::single);
        }
        match self.last {
            Some(n) => BatchSelector::last_n(n, self.case.workflow.clone()).map_err(|e| e.to_string()),
            None => Ok(BatchSelector::all(self.case.workflow.clone())),
        }
    }
}

#[derive(Args)]
struct SkipFlags {
    #[arg(long)]
    skip_fetch: bool,
    #[arg(long)]
    skip_save_raw: bool,
    #[arg(long)]
    skip_parse: bool,
    #[arg(long)]
    skip_save_analysis: bool,
}

impl From<&SkipFlags> for StageSkipSet {
    fn from(flags: &SkipFlags) -> Self {
        StageSkipSet {
            skip_fetch: flags.skip_fetch,
            skip_save_raw: flags.skip_save_raw,
            skip_parse: flags.skip_parse,
            skip_save_analysis: flags.skip_save_analysis,
        }
    }
}

fn load_config(cli: &Cli) -> Result<ScoutConfig, String> {
    let mut config = ScoutConfig::load_or_default(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {}", e))?;
    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    if let Some(logs_dir) = &cli.logs_dir {
        config.logs_dir = logs_dir.clone();
    }
    Ok(config)
}

fn open_store(config: &ScoutConfig) -> Result<Arc<SqliteStore>, String> {
    SqliteStore::open(&config.database)
        .map(Arc::new)
        .map_err(|e| format!("Failed to open database: {}", e))
}

fn build_orchestrator(
    config: &ScoutConfig,
    store: Arc<SqliteStore>,
    incremental: Option<IncrementalSync>,
) -> PipelineOrchestrator {
    let provider = Arc::new(LocalLogProvider::new(&config.logs_dir));
    let orchestrator = PipelineOrchestrator::new(provider.clone(), config.parser_adapter(), store.clone(), store)
        .with_resolver(provider)
        .with_concurrency(config.concurrency);
    match incremental {
        Some(policy) => orchestrator.with_incremental(policy),
        None => orchestrator,
    }
}

fn print_summary(summary: &BatchSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
        return;
    }

    println!("Batch {} ({})", summary.run_id, summary.selector);
    if let Some(reason) = &summary.batch_failure {
        println!("  could not list cases: {}", reason);
        return;
    }
    println!(
        "  {} cases: {} fetched, {} parsed, {} completed, {} failed, {} cancelled",
        summary.total, summary.fetched, summary.parsed, summary.completed, summary.failed, summary.cancelled
    );
    if summary.reused_raw > 0 || summary.already_parsed > 0 {
        println!(
            "  reused {} stored logs, {} already parsed",
            summary.reused_raw, summary.already_parsed
        );
    }
    for failure in &summary.failures {
        println!("  FAILED {}", failure);
    }
}

fn run_batch(
    config: &ScoutConfig,
    selection: &Selection,
    skips: StageSkipSet,
    incremental: Option<IncrementalSync>,
    json: bool,
) -> i32 {
    let selector = match selection.to_selector() {
        Ok(selector) => selector,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };
    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    let orchestrator = build_orchestrator(config, store, incremental);
    let token = orchestrator.cancellation_token();
    let summary = rt.block_on(async {
        let watcher = tokio::spawn(async move {
            // stop listening once the batch itself cancels or finishes
            if let Some(Ok(())) = token.run_until_cancelled(tokio::signal::ctrl_c()).await {
                eprintln!("Cancelling after in-flight stages finish...");
                token.cancel();
            }
        });
        let summary = orchestrator.run_batch(&selector, skips).await;
        watcher.abort();
        summary
    });

    print_summary(&summary, json);
    if summary.is_success() {
        0
    } else {
        1
    }
}

fn cmd_show(config: &ScoutConfig, args: &CaseArgs) -> i32 {
    let case = match args.to_case() {
        Ok(case) => case,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };
    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    // fill in ids from the log directory so name-based lookups hit the stored key
    let provider = LocalLogProvider::new(&config.logs_dir);
    let case = match rt.block_on(resolve_case(&case, &provider)) {
        Ok(case) => case,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let triple = case.triple();

    let record = match store.load_execution(&triple) {
        Ok(Some(record)) => record,
        Ok(None) => {
            eprintln!("Error: no stored execution for {}", case);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    println!("{}", record.case);
    println!("  content type: {}", record.content_type);
    println!("  stored at:    {}", record.stored_at.to_rfc3339());
    println!("  parsed:       {}", record.parsed);
    for (key, value) in &record.metadata {
        println!("  {:<13} {}", format!("{}:", key), value);
    }

    match store.list_analyses(&triple) {
        Ok(analyses) if analyses.is_empty() => println!("No analyses stored."),
        Ok(analyses) => {
            for analysis in analyses {
                println!("\n[{}] parsed at {}", analysis.analysis_kind, analysis.parsed_at.to_rfc3339());
                match serde_json::to_string_pretty(&analysis.parsed_data) {
                    Ok(text) => println!("{}", text),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    0
}

fn print_insights(insights: &Insights, json: bool) {
    if json {
        match serde_json::to_string_pretty(insights) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
        return;
    }

    println!("Scanned {} analyses", insights.analyses_scanned);
    if insights.flaky_tests.is_empty() {
        println!("\nNo flaky tests.");
    } else {
        println!("\nFlaky tests:");
        for flaky in &insights.flaky_tests {
            println!(
                "  {:<60}  fail {:>5.1}%  over {} runs",
                flaky.test_name,
                flaky.fail_rate * 100.0,
                flaky.total_runs
            );
        }
    }
    if insights.recurring_failures.is_empty() {
        println!("\nNo recurring failures.");
    } else {
        println!("\nRecurring failures:");
        for failure in &insights.recurring_failures {
            println!(
                "  {:<60}  {:>3} cases, latest {}",
                failure.test_name, failure.occurrences, failure.latest
            );
        }
    }
}

fn cmd_insights(config: &ScoutConfig, workflow: Option<&str>, options: InsightOptions, json: bool) -> i32 {
    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match collect_insights(&*store, workflow, &options) {
        Ok(insights) => {
            print_insights(&insights, json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}

fn cmd_list(config: &ScoutConfig, workflow: Option<&str>, limit: usize) -> i32 {
    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let records = match store.list_recent_executions(workflow, limit) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if records.is_empty() {
        println!("No executions stored.");
        return 0;
    }

    println!("{:<48}  {:<25}  {:>6}  {}", "CASE", "STORED", "PARSED", "CONCLUSION");
    println!("{}", "-".repeat(96));
    for record in records {
        println!(
            "{:<48}  {:<25}  {:>6}  {}",
            record.case.triple().to_string(),
            record.stored_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            if record.parsed { "yes" } else { "no" },
            record.metadata.get("conclusion").map(String::as_str).unwrap_or("-")
        );
    }
    0
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match &cli.command {
        Commands::Sync {
            selection,
            skips,
            force_download,
            force_parse,
            concurrency,
            json,
        } => {
            let mut config = config;
            if let Some(limit) = concurrency {
                config.concurrency = (*limit).max(1);
            }
            let mut incremental = IncrementalSync::new();
            if *force_download {
                incremental = incremental.with_force_download();
            }
            if *force_parse {
                incremental = incremental.with_force_parse();
            }
            run_batch(&config, selection, StageSkipSet::from(skips), Some(incremental), *json)
        }
        Commands::Parse { selection, json } => {
            run_batch(&config, selection, StageSkipSet::reparse(), None, *json)
        }
        Commands::Insights {
            workflow,
            min_runs,
            threshold,
            min_occurrences,
            window,
            json,
        } => {
            let defaults = config.insights;
            let options = InsightOptions {
                min_runs: min_runs.unwrap_or(defaults.min_runs),
                flakiness_threshold: threshold.unwrap_or(defaults.flakiness_threshold),
                min_occurrences: min_occurrences.unwrap_or(defaults.min_occurrences),
                window: window.unwrap_or(defaults.window),
            };
            cmd_insights(&config, workflow.as_deref(), options, *json)
        }
        Commands::Show { case } => cmd_show(&config, case),
        Commands::List { workflow, limit } => cmd_list(&config, workflow.as_deref(), *limit),
    };
    std::process::exit(code);
}
