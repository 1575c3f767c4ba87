// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use qagen::app_config::{self, Config, ProviderKind};
use qagen::database::{BatchRecord, DatabaseConnection, QuestionStore};
use qagen::generation::{run_batch, BatchEvent, EventWriter, QuestionGenerator, WorkItem};
use qagen::{providers, segments};

/// CLI wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
    Mock,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Ollama => ProviderKind::Ollama,
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::Anthropic => ProviderKind::Anthropic,
            CliProvider::LMStudio => ProviderKind::LMStudio,
            CliProvider::Mock => ProviderKind::Mock,
        }
    }
}

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate questions for every segment of a text file
    Generate(GenerateArgs),

    /// Check an input file and the configuration without generating anything
    Validate(CommonArgs),

    /// Generate shell completions for qagen
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Input text file, or a JSON array of segments
    #[arg(value_name = "INPUT")]
    input_path: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Maximum number of concurrent generation calls
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Generation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use
    #[arg(short, long)]
    model: Option<String>,

    /// API key for hosted providers
    #[arg(long, env = "QAGEN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum number of retry passes
    #[arg(long)]
    max_retries: Option<usize>,

    /// Do not retry failed segments
    #[arg(long)]
    no_retry: bool,

    /// SQLite database file
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Write the progress event stream to a file, or `-` for stdout
    #[arg(long, value_name = "PATH")]
    events: Option<String>,
}

/// qagen - study question generation with AI
///
/// Splits a text into segments and asks an LLM for questions about each one,
/// running several requests at once.
#[derive(Parser, Debug)]
#[command(name = "qagen")]
#[command(version)]
#[command(about = "Concurrent AI question generation")]
#[command(long_about = "qagen splits a text into segments and generates study questions for each one.

EXAMPLES:
    qagen generate notes.txt                          # Generate using default config
    qagen generate -p openai -m gpt-4o-mini notes.txt # Use specific provider and model
    qagen generate --concurrency 8 notes.txt          # Run up to 8 requests at once
    qagen generate --events - notes.txt               # Stream progress events to stdout
    qagen validate segments.json                      # Check input without generating
    qagen completions bash > qagen.bash               # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

/// Colored stderr logger; verbosity follows `log::max_level`
struct CustomLogger;

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    /// ANSI color and prefix for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌ "),
            Level::Warn => ("\x1B[1;33m", "🚧 "),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍 "),
            Level::Trace => ("\x1B[1;35m", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, prefix) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, prefix, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Level is updated once the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "qagen", &mut std::io::stdout());
            Ok(())
        }
        Commands::Validate(args) => run_validate(args),
        Commands::Generate(args) => run_generate(args).await,
    }
}

/// Load the config file, creating a default one if it does not exist
fn load_config(options: &CommonArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &options.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    } else {
        log::set_max_level(level_filter(&config.log_level));
    }

    if let Some(concurrency) = options.concurrency {
        config.generation.concurrency_limit = concurrency;
    }

    Ok(config)
}

fn load_items(input_path: &Path, config: &Config) -> Result<Vec<WorkItem>> {
    if !input_path.is_file() {
        return Err(anyhow!("Input file does not exist: {:?}", input_path));
    }
    let segments = segments::load_segments(input_path, config.segmentation.max_segment_chars)?;
    Ok(WorkItem::from_segments(&segments, &config.prompt))
}

fn run_validate(options: CommonArgs) -> Result<()> {
    let config = load_config(&options)?;
    let items = load_items(&options.input_path, &config)?;

    let report = config.generation.validate(&items);
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    for problem in &report.errors {
        error!("{}", problem);
    }

    if report.is_valid() {
        info!("{} segment(s) ready for generation", items.len());
        Ok(())
    } else {
        Err(anyhow!("Validation failed with {} error(s)", report.errors.len()))
    }
}

async fn run_generate(options: GenerateArgs) -> Result<()> {
    let mut config = load_config(&options.common)?;

    if let Some(provider) = &options.provider {
        config.provider.provider = provider.clone().into();
    }
    let active = config.provider.provider;
    if let Some(model) = &options.model {
        config.provider.provider_config_mut(active).model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.provider.provider_config_mut(active).api_key = api_key.clone();
    }
    if let Some(max_retries) = options.max_retries {
        config.generation.max_retries = max_retries;
    }
    if options.no_retry {
        config.generation.enable_retry = false;
    }
    if let Some(db) = &options.db {
        config.database_path = Some(db.clone());
    }

    config.validate().context("Configuration validation failed")?;

    let input_path = &options.common.input_path;
    let items = load_items(input_path, &config)?;
    let total = items.len() as u64;

    info!(
        "🚀 qagen: {} - {}",
        config.provider.provider.display_name(),
        config.provider.get_model()
    );

    let provider = providers::from_config(&config);
    let generator = Arc::new(QuestionGenerator::new(provider, config.prompt.system_prompt.clone()));

    let db = match &config.database_path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    let batch = BatchRecord::new(
        input_path.to_string_lossy(),
        config.provider.provider.to_string(),
        config.provider.get_model(),
        items.len(),
    );
    let store = Arc::new(QuestionStore::begin(db, batch).await?);
    info!("Batch {}", store.batch_id());

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight segments");
            ctrl_c_cancel.cancel();
        }
    });

    let stream = run_batch(items, config.generation.clone(), generator, Arc::clone(&store), cancel);
    let (events, handle) = stream.into_parts();

    let progress_bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));

    let bar = progress_bar.clone();
    let writer = EventWriter::new(event_output(options.events.as_deref()).await?).on_event(
        move |event: &BatchEvent<Vec<String>>| match event {
            BatchEvent::Progress(snapshot) => {
                bar.set_position(snapshot.settled() as u64);
                bar.set_message(snapshot.current_label.clone());
            }
            BatchEvent::Complete(summary) => {
                bar.finish_with_message(format!("{} of {} segments done", summary.successful, summary.total));
            }
            BatchEvent::Error(payload) => bar.abandon_with_message(payload.message.clone()),
        },
    );

    let report = writer.drain(events).await;
    if report.disconnected {
        warn!("Event output closed early, {} event(s) written", report.events_written);
    }

    let Some(summary) = handle.await.context("Batch task panicked")? else {
        store.fail().await?;
        return Err(anyhow!("Batch could not be started"));
    };

    let status = store.finish(&summary).await?;
    let stored = store.count_for_batch().await?;

    for failure in summary.failures() {
        warn!(
            "Segment {} failed: {}",
            failure.index + 1,
            failure.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    info!(
        "Batch {} {}: {} of {} segment(s) succeeded, {} question(s) stored, {} retried",
        store.batch_id(),
        status,
        summary.successful,
        summary.total,
        stored,
        summary.retried_count
    );

    Ok(())
}

/// Where the event stream goes
async fn event_output(target: Option<&str>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    Ok(match target {
        None => Box::new(tokio::io::sink()),
        Some("-") => Box::new(tokio::io::stdout()),
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create event file: {}", path))?,
        ),
    })
}
