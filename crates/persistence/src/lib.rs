//! ScyllaDB persistence layer for the sales voice agent
//!
//! Provides persistent storage for:
//! - Calls (lifecycle, sales state, transcript blob)
//! - Leads
//! - Transcript denormalizations (lazily updated)
//!
//! Every store is a trait with a ScyllaDB implementation and an in-memory
//! implementation used in tests and when no database is configured.

pub mod calls;
pub mod client;
pub mod leads;
pub mod schema;
pub mod transcripts;

pub use calls::{CallStore, InMemoryCallStore, ScyllaCallStore};
pub use client::{ScyllaClient, ScyllaConfig};
pub use leads::{InMemoryLeadStore, LeadStore, ScyllaLeadStore};
pub use transcripts::{InMemoryTranscriptStore, ScyllaTranscriptStore, TranscriptStore};

use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Connection error: {0}")]
    Connection(#[from] scylla::transport::errors::NewSessionError),

    #[error("Query error: {0}")]
    Query(#[from] scylla::transport::errors::QueryError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Combined persistence layer with all stores
pub struct PersistenceLayer {
    pub calls: std::sync::Arc<dyn CallStore>,
    pub leads: std::sync::Arc<dyn LeadStore>,
    pub transcripts: std::sync::Arc<dyn TranscriptStore>,
}

impl PersistenceLayer {
    /// Connect to ScyllaDB and ensure the schema exists
    pub async fn connect(config: ScyllaConfig) -> Result<Self, PersistenceError> {
        let client = ScyllaClient::connect(config).await?;
        client.ensure_schema().await?;
        Ok(Self {
            calls: std::sync::Arc::new(ScyllaCallStore::new(client.clone())),
            leads: std::sync::Arc::new(ScyllaLeadStore::new(client.clone())),
            transcripts: std::sync::Arc::new(ScyllaTranscriptStore::new(client)),
        })
    }

    /// In-memory stores for development and tests
    pub fn in_memory() -> Self {
        Self {
            calls: std::sync::Arc::new(InMemoryCallStore::new()),
            leads: std::sync::Arc::new(InMemoryLeadStore::new()),
            transcripts: std::sync::Arc::new(InMemoryTranscriptStore::new()),
        }
    }
}
