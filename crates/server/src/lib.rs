//! Carrier webhook server
//!
//! HTTP surface for the voice agent: carrier webhooks (the turn critical
//! path), audio serving, the client broadcast socket, and the operator
//! endpoints.

pub mod auth;
pub mod broadcast;
pub mod calls_api;
pub mod http;
pub mod markup;
pub mod metrics;
pub mod state;
pub mod warmup;
pub mod webhook;

pub use broadcast::{BroadcastBus, BroadcastEvent};
pub use http::create_router;
pub use markup::Markup;
pub use state::AppState;
pub use warmup::WarmupController;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Auth(_) => axum::http::StatusCode::FORBIDDEN,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::Persistence(_) | ServerError::Internal(_) => {
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
