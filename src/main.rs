//! Circulate Server - Borrow Lifecycle Orchestration
//!
//! A Rust REST API server that orchestrates library loans across the
//! inventory and identity services.

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulate_server::{
    api,
    clients::{HttpIdentityClient, HttpInventoryClient, IdentityClient, InventoryClient},
    config::{AppConfig, EventsBackend, StorageBackend},
    publisher::{EventPublisher, MemoryEventPublisher, RedisEventPublisher},
    services::{Services, SweepScheduler},
    store::{LoanStore, MemoryLoanStore, PgLoanStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "circulate_server={},tower_http=debug",
            config.logging.level
        )
        .into()
    });

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Circulate Server v{}", env!("CARGO_PKG_VERSION"));

    // Select the loan store backend
    let store: Arc<dyn LoanStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");

            tracing::info!("Database migrations completed");

            Arc::new(PgLoanStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory loan store; records will not survive a restart");
            Arc::new(MemoryLoanStore::new())
        }
    };

    // Select the event publisher backend
    let publisher: Arc<dyn EventPublisher> = match config.events.backend {
        EventsBackend::Redis => {
            let publisher = RedisEventPublisher::new(&config.redis.url)
                .await
                .expect("Failed to connect to Redis");

            tracing::info!("Connected to Redis");

            Arc::new(publisher)
        }
        EventsBackend::Memory => {
            tracing::warn!("Using in-memory event publisher; events will not leave this process");
            Arc::new(MemoryEventPublisher::new())
        }
    };

    // Outbound service clients
    let inventory: Arc<dyn InventoryClient> = Arc::new(
        HttpInventoryClient::new(
            &config.inventory.base_url,
            Duration::from_millis(config.inventory.timeout_ms),
        )
        .expect("Failed to build inventory client"),
    );
    let identity: Arc<dyn IdentityClient> = Arc::new(
        HttpIdentityClient::new(
            &config.identity.base_url,
            Duration::from_millis(config.identity.timeout_ms),
        )
        .expect("Failed to build identity client"),
    );

    // Save server address and sweep settings before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let sweep_config = config.sweep.clone();

    // Create services
    let services = Services::new(
        store,
        inventory,
        identity,
        publisher,
        config.policy.clone(),
    );

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Start the sweep scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handles = if sweep_config.enabled {
        SweepScheduler::new(state.services.borrows.clone(), sweep_config, shutdown_rx).start()
    } else {
        tracing::info!("Sweep scheduler disabled by configuration");
        Vec::new()
    };

    // Build router
    let app = api::create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweep loops once the server is down
    shutdown_tx.send(true).ok();
    for handle in sweep_handles {
        if tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .is_err()
        {
            tracing::warn!("Sweep task did not stop within 10s");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
    }
}
