//! Call store
//!
//! The call row carries the lifecycle status, the persisted sales state,
//! and the append-only transcript blob. Turn persistence is a single
//! `record_turn` commit so the critical path schedules exactly one
//! background write per turn.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use salesline_core::{Call, CallStatus, ChannelTone, SalesState};

use crate::{PersistenceError, ScyllaClient};

/// Apply a status transition, stamping start/end times exactly once so a
/// redelivered status webhook converges to the same row.
pub fn apply_status(call: &mut Call, status: CallStatus, now: DateTime<Utc>) {
    call.status = status;
    if status == CallStatus::InProgress && call.started_at.is_none() {
        call.started_at = Some(now);
    }
    if status.is_terminal() && call.ended_at.is_none() {
        call.ended_at = Some(now);
    }
}

/// Call persistence operations
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create(&self, call: &Call) -> Result<(), PersistenceError>;

    async fn get(&self, id: Uuid) -> Result<Option<Call>, PersistenceError>;

    async fn set_carrier_sid(&self, id: Uuid, sid: &str) -> Result<(), PersistenceError>;

    /// Idempotent status transition
    async fn update_status(&self, id: Uuid, status: CallStatus) -> Result<(), PersistenceError>;

    async fn set_recording_url(&self, id: Uuid, url: &str) -> Result<(), PersistenceError>;

    /// Append one turn's transcript delta and persist the routed state
    async fn record_turn(
        &self,
        id: Uuid,
        transcript_delta: &str,
        sales_state: SalesState,
    ) -> Result<(), PersistenceError>;
}

/// In-memory store for tests and database-less development
#[derive(Default)]
pub struct InMemoryCallStore {
    calls: RwLock<HashMap<Uuid, Call>>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn create(&self, call: &Call) -> Result<(), PersistenceError> {
        self.calls.write().insert(call.id, call.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Call>, PersistenceError> {
        Ok(self.calls.read().get(&id).cloned())
    }

    async fn set_carrier_sid(&self, id: Uuid, sid: &str) -> Result<(), PersistenceError> {
        let mut calls = self.calls.write();
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        call.carrier_sid = Some(sid.to_string());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: CallStatus) -> Result<(), PersistenceError> {
        let mut calls = self.calls.write();
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        apply_status(call, status, Utc::now());
        Ok(())
    }

    async fn set_recording_url(&self, id: Uuid, url: &str) -> Result<(), PersistenceError> {
        let mut calls = self.calls.write();
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        call.recording_url = Some(url.to_string());
        Ok(())
    }

    async fn record_turn(
        &self,
        id: Uuid,
        transcript_delta: &str,
        sales_state: SalesState,
    ) -> Result<(), PersistenceError> {
        let mut calls = self.calls.write();
        let call = calls
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        if !call.full_transcript.is_empty() {
            call.full_transcript.push('\n');
        }
        call.full_transcript.push_str(transcript_delta);
        call.sales_state = sales_state;
        Ok(())
    }
}

/// ScyllaDB-backed store
#[derive(Clone)]
pub struct ScyllaCallStore {
    client: ScyllaClient,
}

impl ScyllaCallStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn table(&self) -> String {
        format!("{}.calls", self.client.keyspace())
    }
}

type CallRow = (
    Uuid,           // call_id
    Uuid,           // lead_id
    Option<String>, // carrier_sid
    String,         // phone
    String,         // status
    i8,             // sales_state
    String,         // channel
    Option<i64>,    // started_at_ms
    Option<i64>,    // ended_at_ms
    Option<String>, // full_transcript
    Option<String>, // transcript_summary
    Option<String>, // sentiment
    Option<String>, // interest_level
    Option<String>, // recording_url
);

fn row_to_call(row: CallRow) -> Result<Call, PersistenceError> {
    let (
        call_id,
        lead_id,
        carrier_sid,
        phone,
        status,
        sales_state,
        channel,
        started_at_ms,
        ended_at_ms,
        full_transcript,
        transcript_summary,
        sentiment,
        interest_level,
        recording_url,
    ) = row;

    let status = CallStatus::from_carrier(&status)
        .ok_or_else(|| PersistenceError::Decode(format!("unknown status: {status}")))?;
    let sales_state = SalesState::from_id(sales_state as u8)
        .ok_or_else(|| PersistenceError::Decode(format!("unknown sales state: {sales_state}")))?;
    let channel = ChannelTone::from_str(&channel)
        .ok_or_else(|| PersistenceError::Decode(format!("unknown channel: {channel}")))?;

    let to_utc = |ms: i64| Utc.timestamp_millis_opt(ms).single();

    Ok(Call {
        id: call_id,
        lead_id,
        carrier_sid,
        phone,
        status,
        sales_state,
        channel,
        started_at: started_at_ms.and_then(to_utc),
        ended_at: ended_at_ms.and_then(to_utc),
        full_transcript: full_transcript.unwrap_or_default(),
        transcript_summary,
        sentiment,
        interest_level,
        recording_url,
    })
}

#[async_trait]
impl CallStore for ScyllaCallStore {
    async fn create(&self, call: &Call) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {} (call_id, lead_id, carrier_sid, phone, status, sales_state, \
             channel, started_at_ms, ended_at_ms, full_transcript, transcript_summary, \
             sentiment, interest_level, recording_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    call.id,
                    call.lead_id,
                    call.carrier_sid.as_deref(),
                    call.phone.as_str(),
                    call.status.as_str(),
                    call.sales_state.id() as i8,
                    call.channel.as_str(),
                    call.started_at.map(|t| t.timestamp_millis()),
                    call.ended_at.map(|t| t.timestamp_millis()),
                    call.full_transcript.as_str(),
                    call.transcript_summary.as_deref(),
                    call.sentiment.as_deref(),
                    call.interest_level.as_deref(),
                    call.recording_url.as_deref(),
                ),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Call>, PersistenceError> {
        let query = format!(
            "SELECT call_id, lead_id, carrier_sid, phone, status, sales_state, channel, \
             started_at_ms, ended_at_ms, full_transcript, transcript_summary, sentiment, \
             interest_level, recording_url FROM {} WHERE call_id = ?",
            self.table()
        );
        let result = self.client.session().query_unpaged(query, (id,)).await?;
        let mut rows = result
            .rows_typed::<CallRow>()
            .map_err(|e| PersistenceError::Decode(e.to_string()))?;
        match rows.next() {
            Some(row) => {
                let row = row.map_err(|e| PersistenceError::Decode(e.to_string()))?;
                Ok(Some(row_to_call(row)?))
            }
            None => Ok(None),
        }
    }

    async fn set_carrier_sid(&self, id: Uuid, sid: &str) -> Result<(), PersistenceError> {
        let query = format!("UPDATE {} SET carrier_sid = ? WHERE call_id = ?", self.table());
        self.client.session().query_unpaged(query, (sid, id)).await?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: CallStatus) -> Result<(), PersistenceError> {
        let mut call = self
            .get(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        apply_status(&mut call, status, Utc::now());

        let query = format!(
            "UPDATE {} SET status = ?, started_at_ms = ?, ended_at_ms = ? WHERE call_id = ?",
            self.table()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (
                    call.status.as_str(),
                    call.started_at.map(|t| t.timestamp_millis()),
                    call.ended_at.map(|t| t.timestamp_millis()),
                    id,
                ),
            )
            .await?;
        Ok(())
    }

    async fn set_recording_url(&self, id: Uuid, url: &str) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {} SET recording_url = ? WHERE call_id = ?",
            self.table()
        );
        self.client.session().query_unpaged(query, (url, id)).await?;
        Ok(())
    }

    async fn record_turn(
        &self,
        id: Uuid,
        transcript_delta: &str,
        sales_state: SalesState,
    ) -> Result<(), PersistenceError> {
        let mut call = self
            .get(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        if !call.full_transcript.is_empty() {
            call.full_transcript.push('\n');
        }
        call.full_transcript.push_str(transcript_delta);

        let query = format!(
            "UPDATE {} SET full_transcript = ?, sales_state = ? WHERE call_id = ?",
            self.table()
        );
        self.client
            .session()
            .query_unpaged(
                query,
                (call.full_transcript.as_str(), sales_state.id() as i8, id),
            )
            .await?;
        Ok(())
    }
}
