use olx_sniper::config::{AppConfig, HistoryBackend, load_config};
use olx_sniper::{
    CatalogLocale, HistoryStore, HttpFetcher, JsonHistoryStore, OlxParser, ScrapeOrchestrator,
    ScrapeSnapshot, ScraperState, SqliteHistoryStore, StorageError, SystemClock,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let history_store = match open_history_store(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize history storage: {}", e);
            return;
        }
    };

    let orchestrator = match build_orchestrator(&config, history_store.clone()) {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to set up scraper: {}", e);
            return;
        }
    };

    let mut state = ScraperState::load(history_store.as_ref());
    match state.last_scrape() {
        Some(ts) => info!("Last scrape: {}", ts.format("%Y-%m-%d %H:%M:%S")),
        None => info!("No previous scrape recorded"),
    }

    // Ctrl-C cancels in-flight page requests
    let cancel = CancellationToken::new();
    let orchestrator = orchestrator.with_cancellation(cancel.clone());
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling scrape...");
            cancel.cancel();
        }
    });

    let descriptors = config.descriptors();
    let on_progress = |percent: u8| info!("Progress: {}%", percent);

    if config.allow_partial {
        match orchestrator
            .run_partial(&mut state, &descriptors, config.page_limit, Some(&on_progress))
            .await
        {
            Ok(partial) => {
                log_snapshot(partial.snapshot);
                if let Some(e) = &partial.history_error {
                    error!("Scrape history was not saved: {}", e);
                }
                for failure in &partial.failures {
                    warn!("Query \"{}\" failed: {}", failure.label, failure.error);
                }
            }
            Err(e) => error!("Scrape failed: {}", e),
        }
    } else {
        match orchestrator
            .run(&mut state, &descriptors, config.page_limit, Some(&on_progress))
            .await
        {
            Ok(published) => {
                log_snapshot(published.snapshot);
                if let Some(e) = &published.history_error {
                    error!("Scrape history was not saved: {}", e);
                }
            }
            Err(e) => error!("Scrape failed: {}", e),
        }
    }
}

fn open_history_store(config: &AppConfig) -> Result<Arc<dyn HistoryStore>, StorageError> {
    let store: Arc<dyn HistoryStore> = match config.history_backend {
        HistoryBackend::Json => Arc::new(JsonHistoryStore::new(&config.history_path)),
        HistoryBackend::Sqlite => Arc::new(SqliteHistoryStore::new(&config.history_path)?),
    };
    Ok(store)
}

fn build_orchestrator(
    config: &AppConfig,
    history_store: Arc<dyn HistoryStore>,
) -> Result<ScrapeOrchestrator, Box<dyn std::error::Error>> {
    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout())?;
    let base_url = Url::parse(&config.base_url)?;
    let parser = OlxParser::new(base_url, CatalogLocale::polish(), Arc::new(SystemClock));

    let mut orchestrator = ScrapeOrchestrator::new(Arc::new(fetcher), Arc::new(parser), history_store)
        .with_origin(config.base_url.clone());
    if let Some(limit) = config.max_concurrent_queries {
        orchestrator = orchestrator.with_max_concurrency(limit);
    }
    if let Some(dir) = &config.debug_html_dir {
        orchestrator = orchestrator.with_debug_html_dir(dir.clone());
    }
    Ok(orchestrator)
}

fn log_snapshot(snapshot: &ScrapeSnapshot) {
    info!(
        "Scraped {} listings across {} queries",
        snapshot.total_listings(),
        snapshot.len()
    );
    for result in snapshot.iter() {
        info!("{}: {} listings", result.label, result.listings.len());
        if let Some(cheapest) = result.listings.iter().filter(|l| l.price > 0).min_by_key(|l| l.price) {
            info!("  cheapest: {} zł | {} | {}", cheapest.price, cheapest.title, cheapest.item_url);
        }
    }
}
