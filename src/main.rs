//! CLI entry point for shardvec.
//!
//! Builds per-shard embedding checkpoints over a corpus, merges them into a
//! single index and answers top-k queries against it. Main components: Cli
//! parser, Commands enum, and a tokio runtime that runs the blocking build
//! next to a Ctrl-C listener.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use shardvec::checkpoint::CheckpointStore;
use shardvec::config::{LogFormat, LoggingConfig, Settings};
use shardvec::corpus::CorpusScanner;
use shardvec::display::{
    THEME, TableBuilder, Theme, create_build_summary_table, create_hits_table,
    create_progress_bar, create_status_table, with_spinner,
};
use shardvec::encoder::{BatchEncoder, configured_model_name, create_encoder};
use shardvec::error::{ErrorContext, PipelineError, PipelineResult};
use shardvec::io::ExitCode;
use shardvec::pipeline::{BuildReport, MergeEngine, MergeOutcome, ResumeController, plan_build};
use shardvec::search::{
    CorpusIndex, IndexMetadata, IndexPaths, QueryEngine, load_topics, write_topic_run,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Resumable dense-embedding index builder
#[derive(Parser)]
#[command(
    name = "shardvec",
    version = env!("CARGO_PKG_VERSION"),
    about = "Resumable sharded embedding index builder and top-k search",
    long_about = "Embed a sharded JSONL corpus with per-shard checkpoints, merge them into one index, and run top-k queries.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ shardvec init\n  $ shardvec build --corpus data/\n  $ shardvec merge\n  $ shardvec search \"what do cats eat\"\n  $ shardvec run topics.tsv --output run.txt"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Never draw progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .shardvec directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Embed every pending shard
    #[command(
        about = "Embed pending shards into checkpoints, resuming where the last run stopped",
        after_help = "Examples:\n  shardvec build\n  shardvec build --corpus data/ --workers 4\n  SV_ENCODER__BACKEND=hashing shardvec build"
    )]
    Build {
        /// Corpus root directory (overrides config)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Shards processed concurrently, 0 for one per CPU (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Documents per encoder call (overrides config)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Merge completed checkpoints
    #[command(about = "Merge completed shard checkpoints into the corpus index")]
    Merge,

    /// Show build and index state
    #[command(about = "Show discovered, completed and pending shards")]
    Status {
        /// Corpus root directory (overrides config)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run one query
    #[command(
        about = "Search the merged index",
        after_help = "Examples:\n  shardvec search \"cats\"\n  shardvec search \"cats\" --top-k 5 --json"
    )]
    Search {
        /// Query text
        query: String,

        /// Number of results (overrides config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run a topic file and write a TREC run
    #[command(
        about = "Run every query in a topic file and write TREC run lines",
        after_help = "Topic lines are 'query_id<TAB>query text'.\n\nExamples:\n  shardvec run topics.tsv > run.txt\n  shardvec run topics.tsv --output run.txt --run-name dense-v1"
    )]
    Run {
        /// Topic file
        topics: PathBuf,

        /// Run file to write (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Results per query (overrides config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Run tag for the last column (overrides config)
        #[arg(long)]
        run_name: Option<String>,
    },

    /// Show current configuration settings
    #[command(about = "Display effective settings after file and environment overrides")]
    Config,
}

/// Entry point with tokio async runtime.
///
/// Loads settings, installs logging, dispatches the command and maps any
/// failure to an exit code.
#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", THEME.error_with_icon(&format!("Configuration error: {e}")));
            return ExitCode::ConfigError.into();
        }
    };

    init_logging(&settings.logging);

    let show_progress = !cli.no_progress && Theme::progress_enabled();

    match dispatch(cli.command, settings, show_progress).await {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => report_error(&error).into(),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, Box<figment::Error>> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

/// Registry with an `EnvFilter` and a text or JSON layer on stderr.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn report_error(error: &anyhow::Error) -> ExitCode {
    eprintln!("{}", THEME.error_with_icon(&format!("{error:#}")));

    let Some(pipeline) = error.downcast_ref::<PipelineError>() else {
        return ExitCode::GeneralError;
    };

    let suggestions = pipeline.recovery_suggestions();
    if !suggestions.is_empty() {
        eprintln!();
        eprintln!("{}", THEME.apply(&THEME.header, "Suggestions:"));
        for suggestion in suggestions {
            eprintln!("  - {suggestion}");
        }
    }

    let code = ExitCode::from_error(pipeline);
    tracing::debug!(
        status = %pipeline.status_code(),
        exit_code = code as u8,
        "{}",
        code.description()
    );
    code
}

async fn dispatch(
    command: Commands,
    mut settings: Settings,
    show_progress: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Init { force } => run_init(force),

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render settings")?;
            println!("{rendered}");
            Ok(())
        }

        Commands::Build {
            corpus,
            workers,
            batch_size,
        } => {
            if let Some(corpus) = corpus {
                settings.corpus.root = corpus;
            }
            if let Some(workers) = workers {
                settings.build.workers = workers;
            }
            if let Some(batch_size) = batch_size {
                settings.build.batch_size = batch_size;
            }
            settings.validate()?;
            run_build(settings, show_progress).await
        }

        Commands::Merge => {
            settings.validate()?;
            run_merge(&settings, show_progress)
        }

        Commands::Status { corpus, json } => {
            if let Some(corpus) = corpus {
                settings.corpus.root = corpus;
            }
            run_status(&settings, json)
        }

        Commands::Search {
            query,
            top_k,
            json,
        } => {
            if let Some(top_k) = top_k {
                settings.search.top_k = top_k;
            }
            settings.validate()?;
            run_search(&settings, &query, json, show_progress)
        }

        Commands::Run {
            topics,
            output,
            top_k,
            run_name,
        } => {
            if let Some(top_k) = top_k {
                settings.search.top_k = top_k;
            }
            if let Some(run_name) = run_name {
                settings.search.run_name = run_name;
            }
            settings.validate()?;
            run_topics(&settings, &topics, output.as_deref(), show_progress)
        }
    }
}

fn run_init(force: bool) -> anyhow::Result<()> {
    let root = std::env::current_dir().context("Failed to determine current directory")?;
    let path = Settings::init_config_file(&root, force).map_err(|e| PipelineError::ConfigError {
        reason: e.to_string(),
    })?;

    println!(
        "{}",
        THEME.success_with_icon(&format!("Created configuration file at: {}", path.display()))
    );
    println!("Edit this file to point corpus.root at your shards.");
    Ok(())
}

async fn run_build(settings: Settings, show_progress: bool) -> anyhow::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!(
            "{}",
            THEME.warning_with_icon(
                "Interrupt received, finishing shards in flight (press Ctrl-C again to abort)"
            )
        );
        signal_flag.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(i32::from(ExitCode::Interrupted));
        }
    });

    let started = Instant::now();
    let report = tokio::task::spawn_blocking(move || build_blocking(&settings, stop, show_progress))
        .await
        .context("Build task panicked")??;

    if report.nothing_to_do() {
        println!(
            "{}",
            THEME.success_with_icon(&format!(
                "Nothing to do: all {} shard(s) already complete",
                report.discovered
            ))
        );
        return Ok(());
    }

    println!("{}", create_build_summary_table(&report, started.elapsed()));
    println!(
        "{}",
        THEME.success_with_icon(&format!(
            "Built {} shard(s), {} already complete. Run 'shardvec merge' next.",
            report.processed.len(),
            report.already_complete
        ))
    );
    Ok(())
}

fn build_blocking(
    settings: &Settings,
    stop: Arc<AtomicBool>,
    show_progress: bool,
) -> PipelineResult<BuildReport> {
    let checkpoint_dir = settings.resolve_path(&settings.build.checkpoint_dir);

    let encoder = with_spinner("Loading encoder", show_progress, || {
        create_encoder(&settings.encoder)
    })?;
    let store = CheckpointStore::open(checkpoint_dir)?;
    let scanner = corpus_scanner(settings);

    let progress = create_progress_bar(0, "embedding", "shards", show_progress);
    ResumeController::new(scanner, &store, encoder.as_ref(), settings.build.batch_size)
        .with_workers(settings.build.effective_workers())
        .with_stop_flag(stop)
        .with_progress(progress)
        .run()
}

fn run_merge(settings: &Settings, show_progress: bool) -> anyhow::Result<()> {
    let store = CheckpointStore::open_existing(settings.resolve_path(&settings.build.checkpoint_dir))?;
    let paths = IndexPaths::in_dir(&settings.resolve_path(&settings.index.dir));

    let progress = create_progress_bar(0, "merging", "shards", show_progress);
    match MergeEngine::new(&store)
        .with_progress(progress)
        .merge_into(&paths)?
    {
        MergeOutcome::NothingToMerge => {
            println!(
                "{}",
                THEME.warning_with_icon("Nothing to merge: no completed checkpoints")
            );
        }
        MergeOutcome::Merged {
            shards,
            documents,
            dimension,
            model_name,
        } => {
            println!(
                "{}",
                THEME.success_with_icon(&format!(
                    "Merged {documents} documents from {shards} shard(s), dimension {dimension}, encoder {model_name}"
                ))
            );
            if let Ok(configured) = configured_model_name(&settings.encoder) {
                if configured != model_name {
                    tracing::warn!(
                        index_model = %model_name,
                        configured_model = %configured,
                        "checkpoints were built with a different encoder than configured"
                    );
                }
            }
            println!(
                "Index written to {}",
                THEME.apply(&THEME.path, paths.ids.parent().unwrap_or(&paths.ids).display())
            );
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    discovered: usize,
    complete: usize,
    pending: Vec<String>,
    index: Option<&'a IndexMetadata>,
}

/// Scanner over the configured corpus that skips shardvec's own output.
fn corpus_scanner(settings: &Settings) -> CorpusScanner {
    CorpusScanner::new(
        settings.resolve_path(&settings.corpus.root),
        &settings.corpus.extensions,
    )
    .with_excluded([
        settings.resolve_path(&settings.build.checkpoint_dir),
        settings.resolve_path(&settings.index.dir),
    ])
}

fn run_status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let scanner = corpus_scanner(settings);

    let checkpoint_dir = settings.resolve_path(&settings.build.checkpoint_dir);
    let completed = if checkpoint_dir.is_dir() {
        CheckpointStore::open_existing(checkpoint_dir)?.completed()?
    } else {
        BTreeSet::new()
    };
    let plan = plan_build(&scanner, &completed)?;

    let paths = IndexPaths::in_dir(&settings.resolve_path(&settings.index.dir));
    let metadata = if paths.metadata.is_file() {
        Some(IndexMetadata::load(&paths.metadata)?)
    } else {
        None
    };

    if json {
        let report = StatusReport {
            discovered: plan.discovered,
            complete: plan.already_complete,
            pending: plan.pending.iter().map(|s| s.key.to_string()).collect(),
            index: metadata.as_ref(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize status")?
        );
        return Ok(());
    }

    println!("{}", create_status_table(&plan, metadata.as_ref()));

    if !plan.pending.is_empty() {
        let table = plan
            .pending
            .iter()
            .fold(TableBuilder::new().set_headers(vec!["Pending shard", "Path"]), |t, s| {
                t.add_row(vec![s.key.to_string(), s.path.display().to_string()])
            })
            .build();
        println!("{table}");
    }
    Ok(())
}

/// Loads the merged index and the configured encoder.
///
/// Warns when the index was built by a different encoder than configured.
fn open_index(
    settings: &Settings,
    show_progress: bool,
) -> PipelineResult<(Box<dyn BatchEncoder>, CorpusIndex)> {
    let paths = IndexPaths::in_dir(&settings.resolve_path(&settings.index.dir));
    let index = with_spinner("Loading index", show_progress, || CorpusIndex::load(&paths))?;

    match IndexMetadata::load(&paths.metadata) {
        Ok(metadata) => {
            let configured = configured_model_name(&settings.encoder)?;
            if metadata.model_name != configured {
                tracing::warn!(
                    index_model = %metadata.model_name,
                    configured_model = %configured,
                    "index was built with a different encoder"
                );
            }
        }
        Err(error) => tracing::warn!(%error, "index metadata unavailable"),
    }

    let encoder = with_spinner("Loading encoder", show_progress, || {
        create_encoder(&settings.encoder)
    })?;
    Ok((encoder, index))
}

fn run_search(
    settings: &Settings,
    query: &str,
    json: bool,
    show_progress: bool,
) -> anyhow::Result<()> {
    let (encoder, index) = open_index(settings, show_progress)?;
    let engine = QueryEngine::new(encoder.as_ref(), &index)?;
    let hits = engine.search(query, settings.search.top_k)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&hits).context("Failed to serialize results")?
        );
    } else if hits.is_empty() {
        println!("{}", THEME.warning_with_icon("No results: the index is empty"));
    } else {
        println!("{}", create_hits_table(&hits));
    }
    Ok(())
}

fn run_topics(
    settings: &Settings,
    topics_path: &Path,
    output: Option<&Path>,
    show_progress: bool,
) -> anyhow::Result<()> {
    let topics = load_topics(topics_path)?;
    let (encoder, index) = open_index(settings, show_progress)?;
    let engine = QueryEngine::new(encoder.as_ref(), &index)?;

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path).write_context(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let sink = output.unwrap_or(Path::new("<stdout>"));

    let progress = create_progress_bar(topics.len() as u64, "ranking", "queries", show_progress);
    let lines = write_topic_run(
        &engine,
        &topics,
        settings.search.top_k,
        &settings.search.run_name,
        &mut writer,
        sink,
        &progress,
    )?;
    progress.finish_and_clear();

    eprintln!(
        "{}",
        THEME.success_with_icon(&format!(
            "Wrote {lines} run lines for {} queries to {}",
            topics.len(),
            sink.display()
        ))
    );
    Ok(())
}
