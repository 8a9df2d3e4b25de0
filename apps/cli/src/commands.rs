//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use curator_core::{ArchiveReader, ArchiveWriter, FailureKind, Pipeline, StageOutcome};
use curator_fetcher::HttpFetcher;
use curator_rewriter::OpenRouterRewriter;
use curator_shared::{
    AppConfig, DEFAULT_ARCHIVE_TITLE, DEFAULT_REWRITE_TITLE, init_config, load_config,
    load_config_from, render_document_file,
};
use curator_storage::{LibsqlIndex, LocalFileStore, PendingJournal};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Curator: fetch a chapter, rewrite it, archive it.
#[derive(Parser)]
#[command(
    name = "curator",
    version,
    about = "Fetch long-form text, rewrite it under an instruction, and archive the result.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.curator/curator.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch a page and print its title and body.
    Fetch {
        url: String,

        /// Write `{title}\n\n{body}` to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Rewrite text from a file or stdin.
    Rewrite {
        #[arg(short, long, default_value = DEFAULT_REWRITE_TITLE)]
        title: String,

        /// Input file (reads stdin when omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Editing directive (defaults to the configured instruction).
        #[arg(long)]
        instruction: Option<String>,
    },

    /// Archive text from a file or stdin verbatim.
    Archive {
        #[arg(short, long, default_value = DEFAULT_ARCHIVE_TITLE)]
        title: String,

        /// Input file (reads stdin when omitted).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Identity override; the title is used when omitted.
        #[arg(long)]
        id: Option<String>,

        /// Only rewrite the archive file of an already indexed document.
        #[arg(long)]
        retry_file: bool,
    },

    /// List archived documents.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Finish archives interrupted between the index and file writes.
    Reconcile,

    /// Interactive session carrying one draft across stages.
    Session,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "curator=info",
        1 => "curator=debug",
        _ => "curator=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Fetch { url, out } => cmd_fetch(config_path, &url, out.as_deref()).await,
        Command::Rewrite {
            title,
            input,
            instruction,
        } => cmd_rewrite(config_path, &title, input.as_deref(), instruction.as_deref()).await,
        Command::Archive {
            title,
            input,
            id,
            retry_file,
        } => cmd_archive(config_path, &title, input.as_deref(), id.as_deref(), retry_file).await,
        Command::List { json } => cmd_list(config_path, json).await,
        Command::Reconcile => cmd_reconcile(config_path).await,
        Command::Session => cmd_session(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Whether a pipeline gets a rewrite service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RewriteMode {
    /// Fail early when the API key is missing.
    Required,
    /// Attach one if the API key is available.
    Optional,
    Disabled,
}

/// Construct every collaborator once and wire them into a pipeline.
pub(crate) async fn build_pipeline(config: &AppConfig, mode: RewriteMode) -> Result<Pipeline> {
    let archive = &config.archive;
    let index = Arc::new(LibsqlIndex::open(&archive.index_path()?, &archive.collection).await?);
    let files = Arc::new(LocalFileStore::open(archive.files_path()?)?);
    let journal = PendingJournal::open(archive.journal_path()?)?;

    let writer = ArchiveWriter::new(index.clone(), files, archive.file_extension.clone())
        .with_journal(journal);
    let reader = ArchiveReader::new(index);
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);

    let mut pipeline = Pipeline::new(
        fetcher,
        Arc::new(writer),
        reader,
        config.rewrite.default_instruction.clone(),
    )
    .with_export_dir(config.fetch.export_path()?);

    match mode {
        RewriteMode::Required => {
            let rewriter = OpenRouterRewriter::from_env(&config.rewrite)?;
            info!(model = rewriter.model(), "rewrite stage ready");
            pipeline = pipeline.with_rewriter(Arc::new(rewriter));
        }
        RewriteMode::Optional => match OpenRouterRewriter::from_env(&config.rewrite) {
            Ok(rewriter) => {
                info!(model = rewriter.model(), "rewrite stage ready");
                pipeline = pipeline.with_rewriter(Arc::new(rewriter));
            }
            Err(e) => warn!(error = %e, "rewrite stage unavailable"),
        },
        RewriteMode::Disabled => {}
    }

    Ok(pipeline)
}

/// Unwrap a stage outcome, turning failures into CLI errors.
fn into_result<T>(outcome: StageOutcome<T>) -> Result<T> {
    match outcome {
        StageOutcome::Success { data, message } => {
            info!("{message}");
            Ok(data)
        }
        StageOutcome::Failure {
            kind: FailureKind::ArchiveFilePartial,
            message,
        } => Err(eyre!(
            "{message}\nrepair with `curator archive --retry-file` using the same title, id and input, or run `curator reconcile`"
        )),
        StageOutcome::Failure { kind, message } => Err(eyre!("{kind} failed: {message}")),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .wrap_err("failed to read stdin")?;
            Ok(text)
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(config_path: Option<&Path>, url: &str, out: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut pipeline = build_pipeline(&config, RewriteMode::Disabled).await?;

    let spinner = Spinner::start(format!("Fetching {url}"));
    let outcome = pipeline.submit_url(url).await;
    spinner.finish();
    let doc = into_result(outcome)?;

    let rendered = render_document_file(&doc.title, &doc.body);
    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            println!("Saved \"{}\" to {}", doc.title, path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn cmd_rewrite(
    config_path: Option<&Path>,
    title: &str,
    input: Option<&Path>,
    instruction: Option<&str>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    // Validates the API key before any input is read
    let mut pipeline = build_pipeline(&config, RewriteMode::Required).await?;
    let text = read_input(input)?;

    let spinner = Spinner::start(format!("Rewriting \"{title}\""));
    let outcome = pipeline.submit_rewrite(&text, title, instruction).await;
    spinner.finish();

    println!("{}", into_result(outcome)?);
    Ok(())
}

async fn cmd_archive(
    config_path: Option<&Path>,
    title: &str,
    input: Option<&Path>,
    id: Option<&str>,
    retry_file: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut pipeline = build_pipeline(&config, RewriteMode::Disabled).await?;
    let text = read_input(input)?;

    let spinner = Spinner::start(format!("Archiving \"{title}\""));
    let outcome = if retry_file {
        pipeline.retry_file(title, &text, id).await
    } else {
        pipeline.submit_archive(title, &text, id).await
    };
    spinner.finish();

    let receipt = into_result(outcome)?;
    println!("Archived as {} ({})", receipt.id, receipt.path.display());
    if receipt.replaced {
        println!("Note: an existing file for {} was replaced", receipt.id);
    }
    Ok(())
}

async fn cmd_list(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let pipeline = build_pipeline(&config, RewriteMode::Disabled).await?;
    let documents = into_result(pipeline.list_all().await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }
    if documents.is_empty() {
        println!("No archived documents.");
        return Ok(());
    }
    for doc in &documents {
        println!("{}\t{}\t{} chars", doc.id, doc.title, doc.content.chars().count());
    }
    Ok(())
}

async fn cmd_reconcile(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let pipeline = build_pipeline(&config, RewriteMode::Disabled).await?;
    let report = pipeline.writer().reconcile().await?;

    if report.completed.is_empty() && report.failed.is_empty() {
        println!("Nothing pending.");
        return Ok(());
    }
    for id in &report.completed {
        println!("completed {id}");
    }
    for (id, cause) in &report.failed {
        println!("still pending {id}: {cause}");
    }
    if !report.failed.is_empty() {
        return Err(eyre!("{} archive(s) could not be completed", report.failed.len()));
    }
    Ok(())
}

async fn cmd_session(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut pipeline = build_pipeline(&config, RewriteMode::Optional).await?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    crate::session::run(&mut pipeline, stdin, &mut std::io::stdout()).await
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, toml::to_string_pretty(&AppConfig::default())?)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Spinner
// ---------------------------------------------------------------------------

/// Spinner shown on stderr while a stage is in flight.
struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn start(message: String) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map(|s| s.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(message);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    fn finish(self) {
        self.bar.finish_and_clear();
    }
}
