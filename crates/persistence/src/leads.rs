//! Lead store
//!
//! Read-mostly from the call path; writes come from CRM imports upstream.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use salesline_core::Lead;

use crate::{PersistenceError, ScyllaClient};

/// Lead persistence operations
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn upsert(&self, lead: &Lead) -> Result<(), PersistenceError>;

    async fn get(&self, id: Uuid) -> Result<Option<Lead>, PersistenceError>;
}

/// In-memory store for tests and database-less development
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: RwLock<HashMap<Uuid, Lead>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn upsert(&self, lead: &Lead) -> Result<(), PersistenceError> {
        self.leads.write().insert(lead.id, lead.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lead>, PersistenceError> {
        Ok(self.leads.read().get(&id).cloned())
    }
}

/// ScyllaDB-backed store
#[derive(Clone)]
pub struct ScyllaLeadStore {
    client: ScyllaClient,
}

impl ScyllaLeadStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn table(&self) -> String {
        format!("{}.leads", self.client.keyspace())
    }
}

type LeadRow = (
    Uuid,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
);

#[async_trait]
impl LeadStore for ScyllaLeadStore {
    async fn upsert(&self, lead: &Lead) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {} (lead_id, name, company, title, industry, phone, notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    lead.id,
                    lead.name.as_str(),
                    lead.company.as_deref(),
                    lead.title.as_deref(),
                    lead.industry.as_deref(),
                    lead.phone.as_str(),
                    lead.notes.as_deref(),
                ),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lead>, PersistenceError> {
        let query = format!(
            "SELECT lead_id, name, company, title, industry, phone, notes FROM {} \
             WHERE lead_id = ?",
            self.table()
        );
        let result = self.client.session().query_unpaged(query, (id,)).await?;
        let mut rows = result
            .rows_typed::<LeadRow>()
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;
        match rows.next() {
            Some(row) => {
                let (lead_id, name, company, title, industry, phone, notes) =
                    row.map_err(|e| PersistenceError::Decode(e.to_string()))?;
                Ok(Some(Lead {
                    id: lead_id,
                    name,
                    company,
                    title,
                    industry,
                    phone,
                    notes,
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_upsert_get() {
        let store = InMemoryLeadStore::new();
        let lead = Lead {
            id: Uuid::new_v4(),
            name: "Maya Chen".into(),
            company: Some("Acme".into()),
            title: None,
            industry: None,
            phone: "+15550100".into(),
            notes: None,
        };
        store.upsert(&lead).await.unwrap();
        let loaded = store.get(lead.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Maya Chen");
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
