//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::state::{DynListingRepository, DynMediaBackend, DynUserRepository};
use api::{AppState, Config, LogFormat};
use identity::{InMemoryUserRepository, PostgresUserRepository, TokenService};
use listings::{InMemoryListingRepository, PostgresListingRepository};
use media::{InMemoryMediaBackend, LocalMediaBackend};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
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
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Selects the stores and media backend from `config` and wires the state.
async fn build_state(config: &Config) -> Result<AppState, Box<dyn Error>> {
    let tokens = Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl)?);

    let (users, listings): (DynUserRepository, DynListingRepository) = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("../../migrations").run(&pool).await?;
            tracing::info!("using PostgreSQL stores");
            let users: DynUserRepository = Arc::new(PostgresUserRepository::new(pool.clone()));
            let listings: DynListingRepository = Arc::new(PostgresListingRepository::new(pool));
            (users, listings)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let users: DynUserRepository = Arc::new(InMemoryUserRepository::new());
            let listings: DynListingRepository = Arc::new(InMemoryListingRepository::new());
            (users, listings)
        }
    };

    let media: DynMediaBackend = match &config.media_root {
        Some(root) => {
            tracing::info!(root = %root.display(), "using local-disk media backend");
            Arc::new(LocalMediaBackend::new(root, config.media_public_base.as_str()))
        }
        None => {
            tracing::warn!("MEDIA_ROOT not set, using in-memory media backend");
            Arc::new(InMemoryMediaBackend::new())
        }
    };

    Ok(AppState::new(
        users,
        listings,
        media,
        tokens,
        config.timeouts(),
    ))
}

#[tokio::main]
async fn main() {
    // 1. Load and validate configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing
    init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Create stores and application state
    let state = match build_state(&config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, ?config, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
