//! Operator endpoints and audio serving

use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use salesline_core::{Call, ChannelTone};

use crate::broadcast::BroadcastEvent;
use crate::metrics;
use crate::state::AppState;

/// Request body for `POST /calls`
#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub lead_id: Uuid,
    /// Defaults to the lead's phone number
    pub phone: Option<String>,
    #[serde(default)]
    pub channel: ChannelTone,
}

/// `POST /calls` — queue an outbound call for a lead
pub async fn create_call(
    State(state): State<AppState>,
    Json(request): Json<CreateCallRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    metrics::record_request("create_call");
    let lead = state
        .leads
        .get(request.lead_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let phone = request.phone.unwrap_or_else(|| lead.phone.clone());
    let call = Call::new(lead.id, phone, request.channel);
    state
        .calls
        .create(&call)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    state
        .broadcast
        .publish(BroadcastEvent::CallInitiated { call_id: call.id });
    tracing::info!(call_id = %call.id, lead_id = %lead.id, "call queued");

    Ok(Json(serde_json::json!({
        "call_id": call.id,
        "lead_id": lead.id,
        "status": call.status.as_str(),
        "webhook_url": format!(
            "{}/webhook/{}",
            state.config.server.webhook_base_url.trim_end_matches('/'),
            call.id
        ),
    })))
}

/// `GET /calls/quality/metrics` — quality scorer aggregates
pub async fn quality_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.scorer.metrics();
    let cache = state.engine.cache_stats();
    let tts = state.tts_cache.stats();

    Json(serde_json::json!({
        "total_responses": snapshot.total_responses,
        "response_distribution": snapshot.response_distribution,
        "quality_metrics": {
            "avg_overall_score": snapshot.avg_overall_score,
            "avg_length_words": snapshot.avg_length_words,
            "avg_sentiment_score": snapshot.avg_sentiment_score,
            "avg_question_density": snapshot.avg_question_density,
            "avg_engagement_level": snapshot.avg_engagement_level,
        },
        "quality_status": snapshot.quality_status.as_str(),
        "caches": {
            "response": cache,
            "tts": tts,
        },
    }))
}

/// `GET /calls/breakers` — circuit breaker states per upstream
pub async fn breaker_report(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report: Vec<serde_json::Value> = state
        .breakers
        .report()
        .into_iter()
        .map(|(upstream, breaker_state, failures)| {
            serde_json::json!({
                "upstream": upstream.as_str(),
                "state": breaker_state,
                "consecutive_failures": failures,
            })
        })
        .collect();
    Json(serde_json::json!({ "breakers": report }))
}

/// `GET /calls/{call_id}/transcript`
///
/// Reads from the call row's transcript blob, the source of truth. The
/// background persistence task may still be in flight for the newest
/// turn; readers tolerate that lag.
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let call = state
        .calls
        .get(call_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(serde_json::json!({
        "call_id": call.id,
        "lead_id": call.lead_id,
        "status": call.status.as_str(),
        "duration": call.duration_secs(),
        "sentiment": call.sentiment,
        "interest_level": call.interest_level,
        "recording_url": call.recording_url,
        "full_transcript": call.full_transcript,
        "transcript_summary": call.transcript_summary,
    })))
}

/// `GET /calls/{call_id}/tts/{filename}` — serve a content-addressed
/// audio file from the TTS disk cache
pub async fn serve_audio(
    State(state): State<AppState>,
    Path((_call_id, filename)): Path<(Uuid, String)>,
) -> Response {
    // Content-addressed names are hex digests plus an extension; anything
    // else (and any path traversal) is rejected outright.
    let Some((stem, ext)) = filename.rsplit_once('.') else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let valid = !stem.is_empty()
        && stem.chars().all(|c| c.is_ascii_hexdigit())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.tts_cache.disk_path(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = match ext {
                "mp3" => "audio/mpeg",
                "wav" => "audio/wav",
                "ogg" | "opus" => "audio/ogg",
                _ => "application/octet-stream",
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, "public, max-age=86400, immutable"),
                ],
                bytes,
            )
                .into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.broadcast.subscriber_count(),
        "tts_cache": state.tts_cache.stats(),
    }))
}

/// `GET /ready` — probes the LLM endpoint with a short timeout
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let llm_url = state.config.llm.base_url.clone();
    let ready = match tokio::time::timeout(
        std::time::Duration::from_secs(2),
        reqwest::get(llm_url.clone()),
    )
    .await
    {
        Ok(Ok(_)) => true,
        Ok(Err(_)) | Err(_) => false,
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "llm_base_url": llm_url,
        })),
    )
}
