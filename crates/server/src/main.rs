//! Sales voice agent server entry point

use std::net::SocketAddr;

use salesline_config::{load_settings, Settings};
use salesline_persistence::{PersistenceLayer, ScyllaConfig};
use salesline_server::{create_router, metrics, AppState, WarmupController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("SALESLINE_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not up yet.
            eprintln!("Warning: failed to load config: {e}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing();

    tracing::info!("Starting salesline server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        config_env = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let _ = metrics::init_metrics();
    tracing::info!("Prometheus metrics at /metrics");

    let persistence = if settings.persistence.enabled {
        let (hosts, keyspace) = settings
            .persistence
            .parse_url()
            .map_err(|e| anyhow::anyhow!("invalid DATABASE_URL: {e}"))?;
        match PersistenceLayer::connect(ScyllaConfig::new(hosts, keyspace)).await {
            Ok(layer) => {
                tracing::info!("ScyllaDB persistence initialized");
                layer
            }
            Err(e) => {
                tracing::error!("ScyllaDB unavailable ({e}), falling back to in-memory stores");
                PersistenceLayer::in_memory()
            }
        }
    } else {
        tracing::info!("Persistence disabled, using in-memory stores");
        PersistenceLayer::in_memory()
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;

    let state = AppState::build(settings, persistence)
        .map_err(|e| anyhow::anyhow!("failed to build app state: {e}"))?;

    // Keep NAT paths to broadcast clients alive.
    let _ping_loop = state.broadcast.spawn_ping_loop();

    // Warm HTTP pools, the LLM endpoint, and the common phrases without
    // blocking readiness.
    let _warmup = WarmupController::spawn(state.clone());

    let router = create_router(state);

    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json_logs {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
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
    tracing::info!("Shutdown signal received");
}
