//! Ly-Lyric: find songs by their lyrics, then explore and rewrite them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lylyric_chat::{ConfiguredCompletion, LLMConfig};
use lylyric_core::{
    DataPaths, LylyricConfig, SearchService, UnconfiguredSearch, Warehouse,
};
use lylyric_ingest::{ensure_corpus, import_corpus, scan_corpus, DEFAULT_BATCH_SIZE, DEFAULT_CORPUS_URL};
use lylyric_runtime::Orchestrator;
use lylyric_server::{build_router, AppState};
use lylyric_snowflake::{CortexSearch, SnowflakeClient, SnowflakeWarehouse};
use lylyric_store::SqliteStore;

#[derive(Parser)]
#[command(name = "lylyric", version)]
#[command(about = "Find songs by their lyrics, then explore and rewrite them")]
struct Cli {
    /// Config file (default: $LYLYRIC_CONFIG, then ./lylyric.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web server (default)
    Serve,
    /// Load the lyrics corpus into the warehouse
    Import {
        /// Local directory or git URL of the corpus
        source: Option<String>,
        /// Songs per insert statement batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Check configuration and backend connectivity
    Check,
}

/// The warehouse and search backends selected by configuration.
struct Backends {
    warehouse: Arc<dyn Warehouse>,
    search: Arc<dyn SearchService>,
    snowflake: Option<SnowflakeClient>,
    local: Option<Arc<SqliteStore>>,
}

fn connect(config: &LylyricConfig, paths: &DataPaths) -> anyhow::Result<Backends> {
    match &config.snowflake {
        Some(settings) => {
            let client = SnowflakeClient::new(settings.clone())?;
            let warehouse = Arc::new(SnowflakeWarehouse::new(client.clone(), &config.table)?);
            let search: Arc<dyn SearchService> = match &settings.search_service {
                Some(name) => Arc::new(CortexSearch::new(client.clone(), name)?),
                None => {
                    warn!("No search_service configured; similar-song search is disabled");
                    Arc::new(UnconfiguredSearch)
                }
            };
            info!(
                "Using Snowflake account {} ({}.{}.{})",
                settings.account, settings.database, settings.schema, config.table
            );
            Ok(Backends {
                warehouse,
                search,
                snowflake: Some(client),
                local: None,
            })
        }
        None => {
            let store = Arc::new(
                SqliteStore::open(&paths.db_dir).context("Failed to open local store")?,
            );
            info!("Using local SQLite store at {}", store.db_path().display());
            Ok(Backends {
                warehouse: store.clone(),
                search: store.clone(),
                snowflake: None,
                local: Some(store),
            })
        }
    }
}

async fn serve(config: LylyricConfig, paths: DataPaths) -> anyhow::Result<()> {
    let backends = connect(&config, &paths)?;

    let llm_config = Arc::new(RwLock::new(LLMConfig::load(
        &paths.llm_config_file,
        backends.snowflake.is_some(),
    )));
    let completion = Arc::new(ConfiguredCompletion::new(
        llm_config.clone(),
        backends.snowflake.clone(),
    ));

    let orchestrator = Orchestrator::new(
        backends.warehouse,
        backends.search,
        completion,
        config.similar_limit,
    );

    let port = config.port;
    let mut state = AppState::new(config, orchestrator, llm_config);
    if let Some(store) = backends.local {
        state = state.with_local_store(store);
    }
    let state = Arc::new(state);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ly-Lyric listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn import(
    config: LylyricConfig,
    paths: DataPaths,
    source: Option<String>,
    batch_size: usize,
) -> anyhow::Result<()> {
    let backends = connect(&config, &paths)?;
    let source = source.unwrap_or_else(|| DEFAULT_CORPUS_URL.to_string());

    let root = ensure_corpus(&source, &paths.corpus_dir)
        .await
        .with_context(|| format!("Failed to fetch corpus from {}", source))?;
    let (songs, skipped) = scan_corpus(&root)?;

    let report = import_corpus(backends.warehouse.as_ref(), &songs, skipped, batch_size).await?;
    println!(
        "Imported {} of {} songs into {} ({} files skipped)",
        report.inserted,
        report.scanned,
        backends.warehouse.name(),
        report.skipped
    );
    Ok(())
}

async fn check(config: LylyricConfig, paths: DataPaths) -> anyhow::Result<()> {
    let backends = connect(&config, &paths)?;
    backends.warehouse.ensure_table().await?;
    let count = backends.warehouse.count_songs().await?;

    let llm = LLMConfig::load(&paths.llm_config_file, backends.snowflake.is_some());
    let provider = llm
        .resolve_provider()
        .map(|p| format!("{} ({})", p.provider, p.model))
        .unwrap_or_else(|| "none configured".to_string());

    println!("Warehouse:  {} ({} songs in {})", backends.warehouse.name(), count, config.table);
    println!("Search:     {}", backends.search.name());
    println!("Completion: {}", provider);
    println!("Data dir:   {}", paths.root.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = LylyricConfig::load(cli.config.as_deref())?;
    let paths = config.data_paths()?;
    info!("Data directory: {}", paths.root.display());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, paths).await,
        Command::Import { source, batch_size } => import(config, paths, source, batch_size).await,
        Command::Check => check(config, paths).await,
    }
}
