use chrono::{Local, TimeZone};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use zenfeed::behavior::{SystemClock, WatchHistory};
use zenfeed::cli::{Cli, Commands, ConfigAction};
use zenfeed::config::{Config, ConfigValidator};
use zenfeed::error::{Result, ZenfeedError};
use zenfeed::feed::RawFeedItem;
use zenfeed::pipeline::{LogSink, Orchestrator, ReplayFeedSource, Scanner};
use zenfeed::scoring::WeightedRiskScorer;
use zenfeed::store::{ClientStore, JsonFileStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { bind } => {
            cmd_serve(cli.config, bind).await?;
        }
        Commands::Analyze {
            title,
            duration,
            channel,
            json,
        } => {
            cmd_analyze(cli.config, title, duration, channel, json).await?;
        }
        Commands::Replay { file, insights } => {
            cmd_replay(cli.config, &file, insights).await?;
        }
        Commands::History { clear, limit } => {
            cmd_history(cli.config, clear, limit)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "zenfeed=debug" } else { "zenfeed=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let orchestrator = Arc::new(build_orchestrator(&config)?);
    zenfeed::server::run(&bind, Arc::clone(&orchestrator)).await?;

    orchestrator.drain().await;
    Ok(())
}

async fn cmd_analyze(
    config_path: Option<PathBuf>,
    title: String,
    duration: Option<f64>,
    channel: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let orchestrator = build_orchestrator(&config)?;

    let mut raw = RawFeedItem::titled(title);
    if let Some(duration) = duration {
        raw = raw.with_duration_seconds(duration);
    }
    if let Some(channel) = channel {
        raw = raw.with_channel(channel);
    }

    let analysis = orchestrator
        .analyze(&raw)
        .await
        .map_err(|rejection| ZenfeedError::Other(anyhow::anyhow!("Rejected: {}", rejection)))?;

    if json {
        let out = serde_json::to_string_pretty(&analysis).map_err(|e| ZenfeedError::Json {
            source: e,
            context: "Failed to serialize analysis".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    let breakdown = WeightedRiskScorer::new().explain(&analysis.item, &analysis.classification);

    println!("{}", analysis.item.title);
    println!(
        "  Category:   {} ({:.2}, {:?})",
        analysis.classification.category,
        analysis.classification.confidence,
        analysis.classification.source
    );
    println!("  Risk:       {} ({})", analysis.score.value, analysis.score.tier);
    println!("  Breakdown:  {}", breakdown);
    println!("  Action:     {:?}", analysis.action);
    if let Some(alternative) = &analysis.alternative {
        println!("  Instead:    {} <{}>", alternative.title, alternative.url);
    }

    Ok(())
}

async fn cmd_replay(config_path: Option<PathBuf>, file: &Path, show_insights: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let source = ReplayFeedSource::open(file)?;
    tracing::info!("Replaying {} scan frames from {:?}", source.remaining(), file);

    let orchestrator = Arc::new(build_orchestrator(&config)?);
    let scanner = Scanner::new(
        Arc::clone(&orchestrator),
        config.scan_interval()?,
        config.sweep_interval()?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let report = scanner.run(source, LogSink, shutdown_rx).await;
    let stats = orchestrator.stats();
    let learning = orchestrator.learning_state();

    println!("Replay finished");
    println!("  Frames:        {}", report.frames);
    println!("  Items:         {}", report.items);
    println!("  Rendered:      {}", report.rendered);
    println!("  Processed:     {}", stats.processed);
    println!("  Rejected:      {}", stats.rejected);
    println!("  Interventions: {}", stats.interventions);
    println!("  Alternatives:  {}", stats.alternatives_shown);
    println!("  Mode:          {:?}", learning.mode);

    if show_insights {
        print_insights(&orchestrator.insights());
    }

    Ok(())
}

fn cmd_history(config_path: Option<PathBuf>, clear: bool, limit: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let mut history = WatchHistory::load(&store, config.history.capacity);

    if clear {
        history.clear(&store);
        println!("✓ Watch history cleared");
        return Ok(());
    }

    println!("Watch History ({} of {})", history.len(), history.capacity());
    println!("=============");

    let skip = history.len().saturating_sub(limit);
    for entry in history.iter().skip(skip) {
        let when = Local
            .timestamp_millis_opt(entry.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {}  {:<13} {}", when, entry.detected_category, entry.title);
    }

    print_insights(&zenfeed::behavior::Insights::from_history(&history));
    Ok(())
}

fn print_insights(insights: &zenfeed::behavior::Insights) {
    println!("\nInsights");
    println!("  Items:          {}", insights.total_items);
    for (category, count) in &insights.category_counts {
        println!("    {:<13} {}", category, count);
    }
    println!("  Addictive share: {:.0}%", insights.addictive_share * 100.0);
    println!("  Late night:      {}", insights.late_night_items);
    println!("  Trend:           {:?}", insights.trend);
    if insights.early_warning {
        println!("  ⚠ Early warning");
    }
    for note in &insights.notes {
        println!("  - {}", note);
    }
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| ZenfeedError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ZenfeedError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'zenfeed config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}

fn open_store(config: &Config) -> Result<JsonFileStore> {
    let store = JsonFileStore::in_data_dir(&config.data_dir())?;
    tracing::debug!("Client store at {:?}", store.path());
    Ok(store)
}

fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let store: Arc<dyn ClientStore> = Arc::new(open_store(config)?);
    Orchestrator::from_config(config, store, Arc::new(SystemClock))
}
