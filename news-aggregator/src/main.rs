use anyhow::Context;
use clap::{Parser, Subcommand};
use news_aggregator::api::{self, AppState};
use news_aggregator::{FetchConfig, NewsStore, RefreshScheduler, RssAggregator, SourceRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "news-aggregator", version, about = "RSS/Atom news ingestion service")]
struct Cli {
    /// Source list (YAML, TOML or JSON)
    #[arg(long, env = "NEWS_SOURCES", default_value = "sources.yaml", global = true)]
    sources: PathBuf,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://news.db", global = true)]
    database_url: String,

    /// Per-request fetch timeout
    #[arg(long, env = "NEWS_FETCH_TIMEOUT_SECS", default_value_t = 15, global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler and the HTTP API
    Serve {
        #[arg(long, env = "NEWS_BIND", default_value = "127.0.0.1:8000")]
        bind: String,

        #[arg(long, env = "NEWS_REFRESH_INTERVAL_SECS", default_value_t = 3600)]
        interval_secs: u64,
    },
    /// Run one refresh cycle and print the outcome
    Refresh,
    /// Print stored items, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Print the configured sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let registry = SourceRegistry::new(&cli.sources);

    match cli.command {
        Command::Sources => {
            let sources = registry.load()?;
            println!("{}", serde_json::to_string_pretty(&sources)?);
        }
        Command::List { limit, offset } => {
            let store = open_store(&cli.database_url).await?;
            let page = store.page(limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Refresh => {
            let scheduler = build_scheduler(&cli, registry, Duration::ZERO).await?;
            let outcome = scheduler.refresh_now().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Serve {
            ref bind,
            interval_secs,
        } => {
            // A broken sources file stops startup; later edits only fail their cycle.
            let sources = registry
                .load()
                .with_context(|| format!("invalid sources file {}", cli.sources.display()))?;
            info!("Loaded {} sources from {}", sources.len(), cli.sources.display());

            let store = open_store(&cli.database_url).await?;
            let scheduler = Arc::new(RefreshScheduler::new(
                registry.clone(),
                Arc::new(aggregator(&cli)?),
                store.clone(),
                Duration::from_secs(interval_secs),
            ));
            let _timer = Arc::clone(&scheduler).spawn();

            let app = api::router(AppState {
                scheduler,
                store,
                registry,
            });

            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("failed to bind {}", bind))?;
            info!("Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

async fn open_store(database_url: &str) -> anyhow::Result<NewsStore> {
    let store = NewsStore::connect(database_url)
        .await
        .with_context(|| format!("failed to open database {}", database_url))?;
    store.ensure_schema().await?;
    Ok(store)
}

fn aggregator(cli: &Cli) -> anyhow::Result<RssAggregator> {
    let fetch_config = FetchConfig {
        timeout_seconds: cli.timeout_secs,
        ..FetchConfig::default()
    };
    Ok(RssAggregator::new(fetch_config)?)
}

async fn build_scheduler(
    cli: &Cli,
    registry: SourceRegistry,
    interval: Duration,
) -> anyhow::Result<RefreshScheduler> {
    let store = open_store(&cli.database_url).await?;
    Ok(RefreshScheduler::new(
        registry,
        Arc::new(aggregator(cli)?),
        store,
        interval,
    ))
}
