//! Application entry point — Paper Axon CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`AppConfig`] from disk (defaults on first run), then apply
//!    environment overrides and command-line flags.
//! 3. Open the [`PaperService`] (data directories, database, collaborators).
//! 4. Run the requested subcommand.  `interpret` and `podcast` submit a task
//!    and poll it until it finishes; `schedule` runs until interrupted.
//!
//! `settings` only touches `settings.toml` and never opens the library.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use paper_axon::config::{AppConfig, AppPaths};
use paper_axon::service::{PaperService, ServiceError};
use paper_axon::tasks::{TaskRecord, TaskStatus};

/// Academic paper ingestion, interpretation and podcast generation.
#[derive(Parser, Debug)]
#[command(name = "paper-axon")]
#[command(version)]
struct Args {
    /// Data directory (papers, interpretations, podcasts, database)
    #[arg(long, global = true, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Alternative settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Register a local PDF
    Upload { pdf: PathBuf },

    /// Register a paper from an arXiv URL or identifier
    FromArxiv {
        url_or_id: String,
        /// Download metadata and PDF again even if the paper is known
        #[arg(long)]
        refresh: bool,
    },

    /// Show a paper's stored metadata
    Show { paper_id: String },

    /// Print a paper's interpretation (Markdown)
    Interpretation { paper_id: String },

    /// Locate a paper's playable podcast audio
    Audio { paper_id: String },

    /// Interpret a paper (and synthesize its podcast)
    Interpret { paper_id: String },

    /// Generate a podcast from a stored interpretation
    Podcast { paper_id: String },

    /// Search related literature
    Related { paper_id: String },

    /// Show a task record
    Task { task_id: String },

    /// List registered papers, newest first
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Remove a paper and its files
    Delete { paper_id: String },

    /// Ingest papers updated in the last 24 hours
    Collect {
        #[arg(long)]
        category: Option<String>,
    },

    /// Show or change automatic collection settings
    Settings {
        #[arg(long)]
        auto_collect: Option<bool>,
        /// Daily local time, HH:MM
        #[arg(long)]
        collect_time: Option<String>,
    },

    /// Run automatic collection at the configured time until interrupted
    Schedule,
}

fn load_config(args: &Args) -> AppConfig {
    let loaded = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = loaded
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        })
        .with_env_overrides();
    if let Some(dir) = &args.data_dir {
        config.data.data_dir = Some(dir.clone());
    }
    config
}

/// Submit-then-poll for the two task-backed subcommands.
async fn follow(service: &PaperService, config: &AppConfig, task_id: &str) -> Result<()> {
    println!("task {task_id} submitted");
    let record = service
        .wait_task(
            task_id,
            Duration::from_secs(config.tasks.poll_interval_secs.max(1)),
            Duration::from_secs(config.tasks.poll_timeout_secs),
        )
        .await?;
    print_task(&record)?;
    if record.status == TaskStatus::Failed {
        anyhow::bail!("task {task_id} failed");
    }
    Ok(())
}

/// Read or update the `[collect]` table of the settings file.  Environment
/// overrides are not applied, so they are never written back.
fn collect_settings(
    args: &Args,
    auto_collect: Option<bool>,
    collect_time: Option<String>,
) -> Result<()> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);
    let mut stored = AppConfig::load_from(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if auto_collect.is_some() || collect_time.is_some() {
        if let Some(enabled) = auto_collect {
            stored.collect.auto_collect_enabled = enabled;
        }
        if let Some(time) = collect_time {
            stored.collect.collect_time = time;
            stored.collect.time_of_day()?;
        }
        match &args.config {
            Some(path) => stored.save_to(path)?,
            None => stored.save()?,
        }
        log::info!("settings: saved {}", path.display());
    }

    println!(
        "auto_collect_enabled = {}\ncollect_time = {}",
        stored.collect.auto_collect_enabled, stored.collect.collect_time
    );
    Ok(())
}

/// Check the collection settings twice a minute and collect when due.
async fn schedule(service: &PaperService, args: &Args) -> Result<()> {
    let mut tick = tokio::time::interval(Duration::from_secs(30));
    let mut last_run = None;
    log::info!("schedule: waiting for the configured collection time (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("schedule: stopped");
                return Ok(());
            }
        }

        // Re-read so `settings` changes apply without a restart.
        let settings = load_config(args).collect;
        let now = chrono::Local::now().naive_local();
        if !settings.is_due(now, last_run) {
            continue;
        }
        last_run = Some(now);
        match service.collect(None).await {
            Ok(added) => log::info!("schedule: collected {added} new paper(s)"),
            Err(e) => log::error!("schedule: collection failed: {e}"),
        }
    }
}

fn print_task(record: &TaskRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let args = Args::parse();
    if let Command::Settings {
        auto_collect,
        collect_time,
    } = &args.command
    {
        return collect_settings(&args, *auto_collect, collect_time.clone());
    }
    let config = load_config(&args);

    // 3. Service
    let service = PaperService::open(&config)
        .await
        .context("Failed to open paper library")?;

    // 4. Command
    match args.command.clone() {
        Command::Upload { pdf } => {
            let paper = service.upload(&pdf).await?;
            println!("{}\t{}", paper.paper_id, paper.title);
        }
        Command::FromArxiv { url_or_id, refresh } => {
            let paper = if refresh {
                service.refresh_arxiv(&url_or_id).await?
            } else {
                service.from_arxiv(&url_or_id).await?
            };
            println!("{}\t{}", paper.paper_id, paper.title);
        }
        Command::Show { paper_id } => {
            let paper = service.get_paper(&paper_id).await?;
            println!("{}", serde_json::to_string_pretty(&paper)?);
        }
        Command::Interpretation { paper_id } => {
            print!("{}", service.interpretation(&paper_id).await?);
        }
        Command::Audio { paper_id } => {
            let audio = service.podcast(&paper_id).await?;
            println!(
                "{}\t{}\t{:.1}s",
                audio.path.display(),
                audio.media_type,
                audio.duration_secs
            );
        }
        Command::Interpret { paper_id } => {
            let task_id = service.trigger_interpret(&paper_id).await?;
            follow(&service, &config, &task_id).await?;
        }
        Command::Podcast { paper_id } => match service.trigger_podcast(&paper_id).await {
            Ok(task_id) => follow(&service, &config, &task_id).await?,
            Err(ServiceError::AlreadyExists { audio_path, .. }) => {
                println!("podcast already exists: {audio_path}");
            }
            Err(e) => return Err(e.into()),
        },
        Command::Related { paper_id } => {
            let related = service.related(&paper_id).await?;
            println!("{}", serde_json::to_string_pretty(&related)?);
        }
        Command::Task { task_id } => {
            let record = service.poll_task(&task_id).await?;
            print_task(&record)?;
        }
        Command::List { limit, offset } => {
            for paper in service.list(limit, offset).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    paper.paper_id, paper.source_type, paper.updated_at, paper.title
                );
            }
        }
        Command::Delete { paper_id } => {
            service.delete(&paper_id).await?;
            println!("deleted {paper_id}");
        }
        Command::Collect { category } => {
            let added = service.collect(category.as_deref()).await?;
            println!("{added} new paper(s)");
        }
        Command::Schedule => schedule(&service, &args).await?,
        // Handled before the service is opened.
        Command::Settings { .. } => {}
    }

    Ok(())
}
