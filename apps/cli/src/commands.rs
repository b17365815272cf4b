//! CLI command definitions, routing, and tracing setup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use curator_core::{
    PaperRepository, PipelineRegistry, RunOutcome, project, project_all, run_periodic,
};
use curator_gemini::GeminiClient;
use curator_shared::{
    AppConfig, PipelineConfig, TopicDraft, TopicId, config_file_path, expand_home, init_config,
    load_config, resolve_api_key, validate_api_key,
};
use curator_storage::Storage;
use tracing::info;

use crate::progress::RunSpinner;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Curator: a scored, deduplicated feed of the latest papers per topic.
#[derive(Parser)]
#[command(
    name = "curator",
    version,
    about = "Track research topics and curate the latest impactful papers for each.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (overrides `[storage] db_path`).
    #[arg(long, global = true, env = "CURATOR_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage research topics.
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },

    /// Manage curated papers.
    Paper {
        #[command(subcommand)]
        action: PaperAction,
    },

    /// Search for new papers and merge them into the collection.
    Refresh {
        /// Topic to refresh.
        topic: Option<String>,

        /// Refresh every topic.
        #[arg(long, conflicts_with = "topic")]
        all: bool,
    },

    /// Show papers grouped by publication day.
    Timeline {
        /// Topic ID.
        topic: Option<String>,

        /// Show every topic's papers in one timeline.
        #[arg(long, conflicts_with = "topic")]
        all: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Refresh all topics periodically until interrupted.
    Watch {
        /// Minutes between rounds (overrides `[pipeline] refresh_interval_mins`).
        #[arg(long)]
        interval_mins: Option<u64>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Topic subcommands.
#[derive(Subcommand)]
pub(crate) enum TopicAction {
    /// Create a topic.
    Add {
        #[arg(long)]
        title: String,

        /// Natural-language search prompt.
        #[arg(long)]
        prompt: String,
    },
    /// Change a topic's title and/or prompt.
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        prompt: Option<String>,
    },
    /// Delete a topic and all of its papers.
    Remove { id: String },
    /// List topics.
    List,
}

/// Paper subcommands.
#[derive(Subcommand)]
pub(crate) enum PaperAction {
    /// Remove one paper by ID.
    Remove { id: String },
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "curator=info",
        1 => "curator=debug",
        _ => "curator=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
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

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Command::Topic { action } => match action {
            TopicAction::Add { title, prompt } => cmd_topic_add(db, title, prompt).await,
            TopicAction::Edit { id, title, prompt } => {
                cmd_topic_edit(db, &id, title, prompt).await
            }
            TopicAction::Remove { id } => cmd_topic_remove(db, &id).await,
            TopicAction::List => cmd_topic_list(db).await,
        },
        Command::Paper { action } => match action {
            PaperAction::Remove { id } => cmd_paper_remove(db, &id).await,
        },
        Command::Refresh { topic, all } => cmd_refresh(db, topic.as_deref(), all).await,
        Command::Timeline { topic, all, json } => {
            cmd_timeline(db, topic.as_deref(), all, json).await
        }
        Command::Watch { interval_mins } => cmd_watch(db, interval_mins).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Open the database and load the collection.
async fn open_repository(
    config: &AppConfig,
    db_override: Option<PathBuf>,
) -> Result<Arc<PaperRepository>> {
    let db_path = match db_override {
        Some(path) => path,
        None => expand_home(&config.storage.db_path)?,
    };
    info!(db = %db_path.display(), "opening collection");
    let storage = Storage::open(&db_path).await?;
    Ok(Arc::new(PaperRepository::open(Arc::new(storage)).await?))
}

/// Build the pipeline registry. Requires the Gemini API key.
fn build_registry(config: &AppConfig, repository: Arc<PaperRepository>) -> Result<Arc<PipelineRegistry>> {
    let api_key = resolve_api_key(config)?;
    let gemini = Arc::new(GeminiClient::new(api_key, &config.gemini)?);
    Ok(Arc::new(PipelineRegistry::new(
        repository,
        gemini.clone(),
        gemini,
        PipelineConfig::from(config),
    )))
}

// ---------------------------------------------------------------------------
// Topic commands
// ---------------------------------------------------------------------------

async fn cmd_topic_add(db: Option<PathBuf>, title: String, prompt: String) -> Result<()> {
    // Validate before touching the database.
    let topic = TopicDraft::new(title, prompt).into_topic()?;
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;

    repository.save_topic(topic.clone()).await?;
    println!("Topic created: {} ({})", topic.title, topic.id);
    Ok(())
}

async fn cmd_topic_edit(
    db: Option<PathBuf>,
    id: &str,
    title: Option<String>,
    prompt: Option<String>,
) -> Result<()> {
    if title.is_none() && prompt.is_none() {
        return Err(eyre!("nothing to change: pass --title and/or --prompt"));
    }
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    let id = TopicId::from(id);
    let existing = repository
        .topic(&id)
        .await
        .ok_or_else(|| eyre!("no topic with id '{id}'"))?;

    let draft = TopicDraft::new(
        title.unwrap_or_else(|| existing.title.clone()),
        prompt.unwrap_or_else(|| existing.search_prompt.clone()),
    );
    let updated = draft.apply_to(&existing)?;
    repository.save_topic(updated.clone()).await?;
    println!("Topic updated: {} ({})", updated.title, updated.id);
    Ok(())
}

async fn cmd_topic_remove(db: Option<PathBuf>, id: &str) -> Result<()> {
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    let removed = repository.delete_topic(&TopicId::from(id)).await?;
    println!("Topic {id} removed ({removed} papers deleted).");
    Ok(())
}

async fn cmd_topic_list(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    let topics = repository.topics().await;
    if topics.is_empty() {
        println!("No topics yet. Add one with `curator topic add --title ... --prompt ...`.");
        return Ok(());
    }

    println!();
    for topic in topics {
        let count = repository.papers_for_topic(&topic.id).await.len();
        let updated = topic
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("  {}", topic.title);
        println!("    ID:      {}", topic.id);
        println!("    Prompt:  {}", topic.search_prompt);
        println!("    Papers:  {count}");
        println!("    Updated: {updated}");
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Paper commands
// ---------------------------------------------------------------------------

async fn cmd_paper_remove(db: Option<PathBuf>, id: &str) -> Result<()> {
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    if !repository.delete_paper(id).await? {
        return Err(eyre!("no paper with id '{id}'"));
    }
    println!("Paper removed: {id}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_refresh(db: Option<PathBuf>, topic: Option<&str>, all: bool) -> Result<()> {
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    let registry = build_registry(&config, repository.clone())?;

    if all {
        let count = repository.topics().await.len();
        let spinner = RunSpinner::fixed(format!("Refreshing {count} topics..."));
        let outcomes = registry.refresh_all().await;
        spinner.finish();

        let mut failures = 0;
        println!();
        for (id, outcome) in &outcomes {
            let title = repository
                .topic(id)
                .await
                .map(|t| t.title)
                .unwrap_or_else(|| id.to_string());
            println!("  {title}: {outcome}");
            if outcome.is_failure() {
                failures += 1;
            }
        }
        println!();
        if failures > 0 {
            return Err(eyre!("{failures} of {} topics failed to refresh", outcomes.len()));
        }
        return Ok(());
    }

    let id = TopicId::from(topic.ok_or_else(|| eyre!("pass a topic id or --all"))?);
    let rx = registry
        .subscribe(&id)
        .await
        .ok_or_else(|| eyre!("no topic with id '{id}'"))?;
    let spinner = RunSpinner::follow(rx);
    let outcome = registry.refresh(&id).await;
    spinner.finish();

    match outcome {
        RunOutcome::UnknownTopic => Err(eyre!("no topic with id '{id}'")),
        RunOutcome::Failed { reason } => Err(eyre!("update failed: {reason}")),
        outcome => {
            println!("Refresh complete: {outcome}");
            Ok(())
        }
    }
}

async fn cmd_timeline(
    db: Option<PathBuf>,
    topic: Option<&str>,
    all: bool,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    let papers = repository.papers().await;

    let (heading, groups) = if all {
        ("All topics".to_string(), project_all(&papers))
    } else {
        let id = TopicId::from(topic.ok_or_else(|| eyre!("pass a topic id or --all"))?);
        let selected = repository
            .topic(&id)
            .await
            .ok_or_else(|| eyre!("no topic with id '{id}'"))?;
        (selected.title, project(&papers, &id))
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No papers for \"{heading}\" yet. Run `curator refresh`.");
        return Ok(());
    }

    // Topic titles, for labelling papers in the combined view.
    let titles: HashMap<TopicId, String> = repository
        .topics()
        .await
        .into_iter()
        .map(|t| (t.id, t.title))
        .collect();

    println!();
    println!("  {heading}");
    for group in groups {
        println!();
        println!("  {}", group.date.format("%Y-%m-%d"));
        for paper in group.papers {
            let badge = paper.impact_badge.as_deref().unwrap_or("");
            println!("    [{:>3}] {}  {badge}", paper.engagement_score, paper.title);
            if all {
                let title = titles.get(&paper.topic_id).map_or("?", String::as_str);
                println!("          topic: {title}");
            }
            println!("          {}", paper.summary);
            println!(
                "          citations: {}  web: {}",
                paper.citation_count.as_deref().unwrap_or("0"),
                paper.web_mention_count.as_deref().unwrap_or("N/A"),
            );
            println!("          {}", paper.url);
        }
    }
    println!();
    Ok(())
}

async fn cmd_watch(db: Option<PathBuf>, interval_mins: Option<u64>) -> Result<()> {
    let config = load_config()?;
    let repository = open_repository(&config, db).await?;
    let registry = build_registry(&config, repository)?;

    let period = match interval_mins {
        Some(0) => return Err(eyre!("--interval-mins must be at least 1")),
        Some(mins) => Duration::from_secs(mins * 60),
        None => PipelineConfig::from(&config).refresh_interval,
    };
    if period.is_zero() {
        return Err(eyre!("refresh_interval_mins must be at least 1"));
    }

    info!(interval_secs = period.as_secs(), "watching; press Ctrl-C to stop");
    let shutdown = async {
        // If the signal handler cannot be installed, run until killed.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let rounds = run_periodic(registry, period, shutdown).await;
    println!("Stopped after {rounds} refresh rounds.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", config_file_path()?.display());
    println!("{toml_str}");
    match validate_api_key(&config) {
        Ok(()) => println!("# {} is set", config.gemini.api_key_env),
        Err(_) => println!("# {} is NOT set", config.gemini.api_key_env),
    }
    Ok(())
}
