//! HTTP endpoints
//!
//! Router assembly for webhooks, audio serving, the broadcast socket,
//! and the operator endpoints.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::broadcast::ws_handler;
use crate::calls_api::{
    breaker_report, create_call, get_transcript, health_check, quality_metrics, readiness_check,
    serve_audio,
};
use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::webhook::{initial_webhook, recording_webhook, status_webhook, turn_webhook};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Carrier webhooks (signature-checked in the handlers)
        .route("/webhook/:call_id", post(initial_webhook))
        .route("/webhook/:call_id/turn", post(turn_webhook))
        .route("/webhook/:call_id/status", post(status_webhook))
        .route("/webhook/:call_id/recording", post(recording_webhook))
        // Calls
        .route("/calls", post(create_call))
        .route("/calls/quality/metrics", get(quality_metrics))
        .route("/calls/breakers", get(breaker_report))
        .route("/calls/:call_id/transcript", get(get_transcript))
        .route("/calls/:call_id/tts/:filename", get(serve_audio))
        // Client broadcast
        .route("/ws", get(ws_handler))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use salesline_config::Settings;
    use salesline_persistence::PersistenceLayer;

    #[test]
    fn test_router_creation() {
        let mut settings = Settings::default();
        let dir = tempfile::tempdir().unwrap();
        settings.tts.cache_dir = dir.path().to_string_lossy().to_string();
        let state = AppState::build(settings, PersistenceLayer::in_memory()).unwrap();
        let _ = create_router(state);
    }
}
