use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use oiia::aggregator::{ClickAggregator, CounterStore, RankingCache};
use oiia::api::{self, AppState};
use oiia::config::{Config, PersistenceBackend};
use oiia::persistence::{self, FileStore, SnapshotStore, SqliteStore};
use oiia::resolver::CountryResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize the snapshot store
    let store: Arc<dyn SnapshotStore> = match config.persistence.backend {
        PersistenceBackend::File => {
            info!("Using file snapshot store: {}", config.persistence.url);
            Arc::new(FileStore::new(&config.persistence.url))
        }
        PersistenceBackend::Sqlite => {
            info!("Using SQLite snapshot store: {}", config.persistence.url);
            Arc::new(SqliteStore::new(&config.persistence.url, 5).await?)
        }
    };
    store.init().await?;

    // Restore counters; a broken snapshot never prevents startup
    let (counters, corrected) = match store.load().await {
        Ok(Some(persisted)) => CounterStore::from_persisted(&persisted),
        Ok(None) => (CounterStore::new(), false),
        Err(e) => {
            warn!("Failed to load snapshot, starting with empty counters: {e:#}");
            (CounterStore::new(), false)
        }
    };
    info!(
        total = counters.total(),
        countries = counters.participating_countries(),
        "Restored click counters"
    );
    if corrected {
        if let Err(e) = store.save(&counters.to_persisted()).await {
            warn!("Failed to persist corrected snapshot: {e:#}");
        }
    }

    let aggregator = ClickAggregator::spawn(counters, config.ranking.top_n);
    let resolver = Arc::new(CountryResolver::from_config(&config.resolver)?);
    let ranking = Arc::new(RankingCache::new(
        aggregator.clone(),
        Duration::from_secs(config.ranking.ttl_secs),
    ));

    let (shutdown_tx, save_task) = persistence::spawn_save_task(
        aggregator.clone(),
        Arc::clone(&store),
        config.persistence.save_interval_secs,
    );

    let state = Arc::new(AppState {
        aggregator,
        resolver,
        ranking,
        store,
    });
    let router = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Click server listening on http://{}", addr);
    info!("🌍 Country ranking system active");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // In-flight requests have drained; flush once more, bounded so a stuck
    // backend cannot hang the shutdown
    info!("Server stopped, saving final snapshot...");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(5), save_task)
        .await
        .is_err()
    {
        warn!("Timed out waiting for the final snapshot save");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
