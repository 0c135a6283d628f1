//! Denormalized transcript rows
//!
//! The call row's transcript blob is the source of truth; this table is a
//! lazily updated copy for consumers that only want transcripts. Updates
//! may lag the blob and readers must tolerate that.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{PersistenceError, ScyllaClient};

/// Transcript denormalization operations
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn upsert(
        &self,
        call_id: Uuid,
        lead_id: Uuid,
        content: &str,
    ) -> Result<(), PersistenceError>;

    async fn get(&self, call_id: Uuid) -> Result<Option<String>, PersistenceError>;
}

/// In-memory store for tests and database-less development
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    transcripts: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn upsert(
        &self,
        call_id: Uuid,
        _lead_id: Uuid,
        content: &str,
    ) -> Result<(), PersistenceError> {
        self.transcripts.write().insert(call_id, content.to_string());
        Ok(())
    }

    async fn get(&self, call_id: Uuid) -> Result<Option<String>, PersistenceError> {
        Ok(self.transcripts.read().get(&call_id).cloned())
    }
}

/// ScyllaDB-backed store
#[derive(Clone)]
pub struct ScyllaTranscriptStore {
    client: ScyllaClient,
}

impl ScyllaTranscriptStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn table(&self) -> String {
        format!("{}.transcripts", self.client.keyspace())
    }
}

#[async_trait]
impl TranscriptStore for ScyllaTranscriptStore {
    async fn upsert(
        &self,
        call_id: Uuid,
        lead_id: Uuid,
        content: &str,
    ) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {} (call_id, lead_id, content, updated_at_ms) VALUES (?, ?, ?, ?)",
            self.table()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (call_id, lead_id, content, Utc::now().timestamp_millis()),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, call_id: Uuid) -> Result<Option<String>, PersistenceError> {
        let query = format!("SELECT content FROM {} WHERE call_id = ?", self.table());
        let result = self.client.session().query_unpaged(query, (call_id,)).await?;
        let mut rows = result
            .rows_typed::<(Option<String>,)>()
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;
        match rows.next() {
            Some(row) => {
                let (content,) = row.map_err(|e| PersistenceError::Decode(e.to_string()))?;
                Ok(content)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_upsert_overwrites() {
        let store = InMemoryTranscriptStore::new();
        let call_id = Uuid::new_v4();
        let lead_id = Uuid::new_v4();
        store.upsert(call_id, lead_id, "User: hi").await.unwrap();
        store
            .upsert(call_id, lead_id, "User: hi\nAgent: hello")
            .await
            .unwrap();
        assert_eq!(
            store.get(call_id).await.unwrap().as_deref(),
            Some("User: hi\nAgent: hello")
        );
    }
}
