mod config;
mod db;
mod handlers;
mod models;
mod notify;
mod router;
mod routeros;
mod status;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use db::Store;
use notify::Notifier;
use routeros::RouterClient;
use status::{AggregateCounter, Reconciler, StatusPoller, SweepSnapshot};

/// Application state shared across handlers
pub struct AppState {
    pub store: Store,
    pub reconciler: Arc<Reconciler>,
    pub counter: Arc<AggregateCounter>,
    pub snapshot: SweepSnapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wan_health=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    tracing::info!("Starting WanHealth Server");
    tracing::info!("Database: {}", cfg.db_path);
    tracing::info!("Listen: {}", cfg.listen_addr);
    match &cfg.session_router {
        Some(endpoint) => tracing::info!("Session router: {}", endpoint),
        None => tracing::warn!("SESSION_ROUTER_HOST not set - global sweeps will count every device offline"),
    }

    // Initialize database
    let store = Store::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
    tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);

    // Router client and alert channels
    let router_client = Arc::new(RouterClient::new(cfg.router_timeout())?);
    let notifier = Arc::new(Notifier::from_config(store.clone(), &cfg)?);

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        router_client,
        notifier,
        cfg.router_timeout(),
        cfg.sweep_concurrency,
    ));
    let counter = Arc::new(AggregateCounter::new(
        store.clone(),
        reconciler.clone(),
        cfg.session_router.clone(),
    ));

    // Initialize status poller
    let mut status_poller = StatusPoller::new(counter.clone(), cfg.poll_interval_secs);
    status_poller.start();
    tracing::info!("Status poller started (interval={}s)", cfg.poll_interval_secs);

    // Create app state
    let state = Arc::new(AppState {
        store,
        reconciler,
        counter,
        snapshot: status_poller.snapshot(),
    });

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("WanHealth listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    status_poller.stop();
    tracing::info!("WanHealth shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
