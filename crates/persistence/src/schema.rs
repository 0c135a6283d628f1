//! ScyllaDB schema creation

use crate::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create all required tables
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    // One row per telephony session. Timestamps are epoch milliseconds;
    // the transcript blob is the source of truth for the conversation.
    let calls_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.calls (
            call_id UUID,
            lead_id UUID,
            carrier_sid TEXT,
            phone TEXT,
            status TEXT,
            sales_state TINYINT,
            channel TEXT,
            started_at_ms BIGINT,
            ended_at_ms BIGINT,
            full_transcript TEXT,
            transcript_summary TEXT,
            sentiment TEXT,
            interest_level TEXT,
            recording_url TEXT,
            PRIMARY KEY (call_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(calls_table, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create calls table: {}", e)))?;

    let leads_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.leads (
            lead_id UUID,
            name TEXT,
            company TEXT,
            title TEXT,
            industry TEXT,
            phone TEXT,
            notes TEXT,
            PRIMARY KEY (lead_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(leads_table, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("Failed to create leads table: {}", e)))?;

    // Denormalized transcript copy, updated lazily after each turn.
    let transcripts_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.transcripts (
            call_id UUID,
            lead_id UUID,
            content TEXT,
            updated_at_ms BIGINT,
            PRIMARY KEY (call_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(transcripts_table, &[])
        .await
        .map_err(|e| {
            PersistenceError::Schema(format!("Failed to create transcripts table: {}", e))
        })?;

    tracing::info!("All tables created successfully");
    Ok(())
}
