//! Deepresearch CLI — runs one research pipeline and streams its progress
//! to the terminal.

use anyhow::Context;
use clap::Parser;
use deepresearch_core::{
    Mailer, NoopMailer, ProgressEvent, ResearchPipeline, SearchProgress, SmtpMailer,
    WebSearchBackend, create_provider, load_config,
};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Deepresearch: plan, search, evaluate, write, deliver
#[derive(Parser, Debug)]
#[command(name = "deepresearch", version, about, long_about = None)]
struct Cli {
    /// The research query
    query: String,

    /// LLM model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Workspace directory (for `.deepresearch/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Also write the markdown report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip SMTP delivery (the delivery stage becomes a no-op)
    #[arg(long)]
    no_deliver: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

/// Prints "searching... k/N" to stderr as search tasks settle.
struct StderrProgress;

impl SearchProgress for StderrProgress {
    fn on_settled(&self, completed: usize, total: usize) {
        eprintln!("searching... {}/{} completed", completed, total);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("rs", "deepresearch", "deepresearch")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "deepresearch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from("."));

    let mut config =
        load_config(Some(&workspace), None).context("failed to load configuration")?;
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    tracing::debug!(model = %config.llm.model, "configuration loaded");

    // Capabilities are constructed once here and passed into the pipeline.
    let llm = create_provider(&config.llm).context("failed to create LLM provider")?;
    let backend = Arc::new(
        WebSearchBackend::new(&config.search, llm.clone())
            .context("failed to create search backend")?,
    );
    let mailer: Arc<dyn Mailer> = if cli.no_deliver {
        Arc::new(NoopMailer::new())
    } else {
        Arc::new(SmtpMailer::new(&config.delivery).context("failed to create SMTP mailer")?)
    };

    let pipeline = ResearchPipeline::new(&config, llm, backend, mailer);
    let mut stream = pipeline.run_with_observer(cli.query, Arc::new(StderrProgress));

    let mut report = None;
    while let Some(event) = stream.next().await {
        match event? {
            ProgressEvent::Status(status) => {
                if !cli.quiet {
                    eprintln!("{status}");
                }
            }
            ProgressEvent::Report(text) => report = Some(text),
        }
    }

    let report = report.context("pipeline ended without a report")?;
    if let Some(path) = cli.output {
        std::fs::write(&path, &report)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        if !cli.quiet {
            eprintln!("report written to {}", path.display());
        }
    }
    println!("{report}");

    Ok(())
}
