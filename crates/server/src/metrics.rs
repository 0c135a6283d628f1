//! Prometheus metrics
//!
//! Counters and histograms for the turn pipeline, exposed at `/metrics`.
//! The recorder is installed once at startup; the handle renders the
//! scrape body.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle);
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            HANDLE.get()
        }
        Err(e) => {
            tracing::warn!("failed to install metrics recorder: {e}");
            None
        }
    }
}

/// Render the scrape body for `GET /metrics`
pub async fn metrics_handler() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

pub fn record_request(endpoint: &'static str) {
    counter!("salesline_requests_total", "endpoint" => endpoint).increment(1);
}

pub fn record_turn_latency(total_ms: u64, source: &'static str) {
    histogram!("salesline_turn_latency_ms", "source" => source).record(total_ms as f64);
}

pub fn record_llm_latency(ms: u64) {
    histogram!("salesline_llm_latency_ms").record(ms as f64);
}

pub fn record_tts_latency(ms: u64) {
    histogram!("salesline_tts_latency_ms").record(ms as f64);
}

pub fn record_cache_hit(tier: &'static str, hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!("salesline_cache_lookups_total", "tier" => tier, "outcome" => outcome).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("salesline_errors_total", "kind" => kind).increment(1);
}
