//! Carrier webhooks
//!
//! The turn handler is the per-turn critical path: load the call, route
//! the state machine, run the response engine, schedule persistence and
//! broadcast without awaiting them, and return playback markup. The only
//! durability requirement is the transcript append; everything else past
//! the engine is safe to reorder or lose.

use axum::extract::{Form, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use uuid::Uuid;

use salesline_agent::{route, ConversationState};
use salesline_core::{Call, CallStatus, LatencyTracker, Lead, TurnStage};

use crate::auth::verify_webhook;
use crate::broadcast::BroadcastEvent;
use crate::markup::{exit_markup, minimal_markup, turn_markup};
use crate::metrics;
use crate::state::AppState;

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}

fn form_pairs(form: &HashMap<String, String>) -> Vec<(String, String)> {
    form.iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn check_signature(
    state: &AppState,
    headers: &HeaderMap,
    url: &str,
    form: &HashMap<String, String>,
) -> Result<(), Response> {
    let carrier = &state.config.carrier;
    verify_webhook(
        carrier.signature_verification_enabled,
        &carrier.auth_token,
        headers,
        url,
        &form_pairs(form),
    )
    .map_err(|e| {
        metrics::record_error("auth");
        tracing::warn!(url, error = %e, "webhook signature rejected");
        (StatusCode::FORBIDDEN, "forbidden").into_response()
    })
}

/// Load the call and its lead, or answer with minimal valid markup.
async fn load_call(state: &AppState, call_id: Uuid) -> Result<(Call, Lead), Response> {
    let call = match state.calls.get(call_id).await {
        Ok(Some(call)) => call,
        Ok(None) => {
            metrics::record_error("state_violation");
            tracing::warn!(%call_id, "webhook for unknown call");
            return Err(xml_response(minimal_markup()));
        }
        Err(e) => {
            metrics::record_error("internal");
            tracing::error!(%call_id, error = %e, "failed to load call");
            return Err(xml_response(minimal_markup()));
        }
    };
    let lead = match state.leads.get(call.lead_id).await {
        Ok(Some(lead)) => lead,
        Ok(None) => {
            metrics::record_error("state_violation");
            tracing::warn!(%call_id, lead_id = %call.lead_id, "call references unknown lead");
            return Err(xml_response(minimal_markup()));
        }
        Err(e) => {
            metrics::record_error("internal");
            tracing::error!(%call_id, error = %e, "failed to load lead");
            return Err(xml_response(minimal_markup()));
        }
    };
    Ok((call, lead))
}

/// `POST /webhook/{call_id}` — the carrier connected; play the opener
pub async fn initial_webhook(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    headers: HeaderMap,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    metrics::record_request("webhook_initial");
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let url = format!(
        "{}/webhook/{}",
        state.config.server.webhook_base_url.trim_end_matches('/'),
        call_id
    );
    if let Err(response) = check_signature(&state, &headers, &url, &form) {
        return response;
    }

    let (call, lead) = match load_call(&state, call_id).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    // Lifecycle bookkeeping off the critical path.
    if let Some(sid) = form.get("CallSid").cloned() {
        let calls = state.calls.clone();
        tokio::spawn(async move {
            if let Err(e) = calls.set_carrier_sid(call_id, &sid).await {
                tracing::warn!(%call_id, error = %e, "failed to store carrier sid");
            }
        });
    }
    {
        let calls = state.calls.clone();
        tokio::spawn(async move {
            if let Err(e) = calls.update_status(call_id, CallStatus::InProgress).await {
                tracing::warn!(%call_id, error = %e, "failed to mark call in progress");
            }
        });
    }
    state
        .broadcast
        .publish(BroadcastEvent::CallInProgress { call_id });

    let mut tracker = LatencyTracker::new(call_id);
    let conv = ConversationState::resume(&call, &lead, &state.detector);
    let reply = state
        .engine
        .respond(
            &call,
            &lead,
            &conv,
            salesline_agent::ReplyDirective::Generate,
            "",
            &mut tracker,
        )
        .await;

    // The opener is the first transcript line.
    let delta = format!("Agent: {}", reply.text);
    {
        let calls = state.calls.clone();
        let delta = delta.clone();
        let sales_state = conv.state;
        tokio::spawn(async move {
            if let Err(e) = calls.record_turn(call_id, &delta, sales_state).await {
                tracing::error!(%call_id, error = %e, "failed to persist opener");
            }
        });
    }
    tracker.mark(TurnStage::PersistDone);
    state.broadcast.publish(BroadcastEvent::CallTranscriptUpdate {
        call_id,
        delta,
    });

    let audio_url = reply
        .audio_filename
        .as_deref()
        .map(|f| state.audio_url(call_id, f));
    let xml = turn_markup(
        audio_url.as_deref(),
        &reply.text,
        &state.turn_action_url(call_id),
        conv.state.gather_timeout_secs(),
    );

    let total_ms = tracker.finish(reply.source);
    metrics::record_turn_latency(total_ms, reply.source.as_str());
    xml_response(xml)
}

/// `POST /webhook/{call_id}/turn` — one user turn
pub async fn turn_webhook(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    headers: HeaderMap,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    metrics::record_request("webhook_turn");
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let url = state.turn_action_url(call_id);
    if let Err(response) = check_signature(&state, &headers, &url, &form) {
        return response;
    }

    let mut tracker = LatencyTracker::new(call_id);

    let (call, lead) = match load_call(&state, call_id).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    // An absent field is "no speech"; routing treats it as no response.
    let user_text = form.get("SpeechResult").cloned().unwrap_or_default();

    let mut conv = ConversationState::resume(&call, &lead, &state.detector);
    let flags = state.detector.detect(&user_text);
    conv.observe_user_text(&user_text, &flags);
    let outcome = route(&mut conv, &flags, &user_text);
    conv.enter(outcome.next);

    let reply = state
        .engine
        .respond(&call, &lead, &conv, outcome.directive, &user_text, &mut tracker)
        .await;

    metrics::record_cache_hit("response", reply.cache_hit);

    // One batched commit per turn, on a task the handler never awaits.
    // The transcript row refresh rides along lazily.
    let delta = format!("User: {}\nAgent: {}", user_text.trim(), reply.text);
    {
        let calls = state.calls.clone();
        let transcripts = state.transcripts.clone();
        let delta = delta.clone();
        let mut full = call.full_transcript.clone();
        let sales_state = conv.state;
        let lead_id = lead.id;
        tokio::spawn(async move {
            if let Err(e) = calls.record_turn(call_id, &delta, sales_state).await {
                tracing::error!(%call_id, error = %e, "failed to persist turn transcript");
                return;
            }
            if !full.is_empty() {
                full.push('\n');
            }
            full.push_str(&delta);
            if let Err(e) = transcripts.upsert(call_id, lead_id, &full).await {
                tracing::warn!(%call_id, error = %e, "failed to refresh transcript row");
            }
        });
    }
    tracker.mark(TurnStage::PersistDone);

    state.broadcast.publish(BroadcastEvent::CallTranscriptUpdate {
        call_id,
        delta,
    });

    let audio_url = reply
        .audio_filename
        .as_deref()
        .map(|f| state.audio_url(call_id, f));
    let xml = if conv.end_call {
        exit_markup(audio_url.as_deref(), &reply.text)
    } else {
        turn_markup(
            audio_url.as_deref(),
            &reply.text,
            &state.turn_action_url(call_id),
            conv.state.gather_timeout_secs(),
        )
    };

    if let Some(llm_ms) = tracker.stage_ms(TurnStage::LlmDone) {
        metrics::record_llm_latency(llm_ms);
    }
    if let Some(tts_ms) = tracker.stage_ms(TurnStage::TtsDone) {
        metrics::record_tts_latency(tts_ms);
    }
    let total_ms = tracker.finish(reply.source);
    metrics::record_turn_latency(total_ms, reply.source.as_str());
    tracing::info!(
        target: "turn",
        %call_id,
        state = conv.state.display_name(),
        source = reply.source.as_str(),
        quality = reply.quality,
        end_call = conv.end_call,
        total_ms,
        "turn served"
    );

    xml_response(xml)
}

/// `POST /webhook/{call_id}/status` — lifecycle callback
///
/// May be redelivered; the store transition is idempotent.
pub async fn status_webhook(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    headers: HeaderMap,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    metrics::record_request("webhook_status");
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let url = format!(
        "{}/webhook/{}/status",
        state.config.server.webhook_base_url.trim_end_matches('/'),
        call_id
    );
    if let Err(response) = check_signature(&state, &headers, &url, &form) {
        return response;
    }

    let Some(status) = form
        .get("CallStatus")
        .and_then(|s| CallStatus::from_carrier(s))
    else {
        metrics::record_error("bad_input");
        tracing::warn!(%call_id, status = ?form.get("CallStatus"), "status webhook with bad payload");
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Err(e) = state.calls.update_status(call_id, status).await {
        metrics::record_error("state_violation");
        tracing::warn!(%call_id, error = %e, "status update failed");
        return StatusCode::OK.into_response();
    }

    state.broadcast.publish(BroadcastEvent::CallStatus {
        call_id,
        status: status.as_str().to_string(),
    });

    if status.is_terminal() {
        // Post-call enrichment (summary, sentiment, email draft) is owned
        // by the downstream pipeline; the hook is the log event.
        tracing::info!(%call_id, status = status.as_str(), "call ended, post-call pipeline notified");
    }

    StatusCode::OK.into_response()
}

/// `POST /webhook/{call_id}/recording` — recording-ready callback
pub async fn recording_webhook(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
    headers: HeaderMap,
    form: Option<Form<HashMap<String, String>>>,
) -> Response {
    metrics::record_request("webhook_recording");
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let url = format!(
        "{}/webhook/{}/recording",
        state.config.server.webhook_base_url.trim_end_matches('/'),
        call_id
    );
    if let Err(response) = check_signature(&state, &headers, &url, &form) {
        return response;
    }

    let Some(recording_url) = form.get("RecordingUrl") else {
        metrics::record_error("bad_input");
        return StatusCode::BAD_REQUEST.into_response();
    };

    if let Err(e) = state.calls.set_recording_url(call_id, recording_url).await {
        tracing::warn!(%call_id, error = %e, "failed to store recording url");
    }

    StatusCode::OK.into_response()
}
