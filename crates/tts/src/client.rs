//! TTS provider client
//!
//! One pooled HTTP client per process. Lookups go memory → disk →
//! provider; an in-flight guard ensures concurrent misses on the same
//! phrase make a single provider call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::Serialize;

use salesline_core::UpstreamBreakers;

use crate::cache::{audio_key, TtsCache};
use crate::TtsError;

/// Result of a synthesis lookup
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Content-addressed filename under the cache directory; the carrier
    /// fetches it via the audio-serving endpoint
    pub filename: String,
    pub bytes: Arc<Vec<u8>>,
    /// Served without a provider call
    pub cache_hit: bool,
}

/// Speech synthesis backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize with the configured voice and format
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError>;
}

/// HTTP client against an OpenAI-compatible speech API
pub struct HttpTtsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    format: String,
    timeout: Duration,
    cache: Arc<TtsCache>,
    breakers: Arc<UpstreamBreakers>,
    /// Per-key guard so concurrent misses dedupe to one provider call
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl HttpTtsClient {
    pub fn new(
        settings: &salesline_config::TtsSettings,
        cache: Arc<TtsCache>,
        breakers: Arc<UpstreamBreakers>,
    ) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TtsError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            voice: settings.voice.clone(),
            format: settings.format.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            cache,
            breakers,
            in_flight: DashMap::new(),
        })
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Full synthesis entry point
    pub async fn synthesize_with(
        &self,
        text: &str,
        voice: &str,
        format: &str,
    ) -> Result<SynthesizedAudio, TtsError> {
        let key = audio_key(text, voice, format);
        let filename = TtsCache::filename(&key, format);

        if let Some(bytes) = self.cache.get(&key, format).await {
            return Ok(SynthesizedAudio { filename, bytes, cache_hit: true });
        }

        // Serialize concurrent misses on the same key.
        let guard = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _held = guard.lock().await;

        // A racing caller may have populated the cache while we waited.
        if let Some(bytes) = self.cache.get(&key, format).await {
            self.in_flight.remove(&key);
            return Ok(SynthesizedAudio { filename, bytes, cache_hit: true });
        }

        // The guard entry stays until the cache holds the result, so late
        // arrivals always find either the entry or the cached audio.
        let result = async {
            let bytes = Arc::new(self.call_provider(text, voice, format).await?);
            self.cache.put(&key, format, bytes.clone()).await?;
            Ok::<_, TtsError>(bytes)
        }
        .await;
        self.in_flight.remove(&key);
        let bytes = result?;

        Ok(SynthesizedAudio { filename, bytes, cache_hit: false })
    }

    async fn call_provider(
        &self,
        text: &str,
        voice: &str,
        format: &str,
    ) -> Result<Vec<u8>, TtsError> {
        if !self.breakers.tts().should_attempt() {
            return Err(TtsError::Api("tts circuit open".to_string()));
        }

        let start = Instant::now();
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: format,
        };

        let result = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                self.breakers.tts().record_failure();
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            self.breakers.tts().record_failure();
            return Err(TtsError::Api(format!("HTTP {status}: {text}")));
        }

        let bytes = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                self.breakers.tts().record_failure();
                return Err(e.into());
            }
        };

        self.breakers.tts().record_success();
        tracing::info!(
            target: "tts",
            voice,
            format,
            chars = text.len(),
            bytes = bytes.len(),
            total_ms = start.elapsed().as_millis() as u64,
            "synthesis complete"
        );

        Ok(bytes)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpTtsClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError> {
        let voice = self.voice.clone();
        let format = self.format.clone();
        self.synthesize_with(text, &voice, &format).await
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_request_serialization() {
        let body = SpeechRequest {
            model: "tts-1",
            input: "Hello Maya",
            voice: "alloy",
            response_format: "mp3",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"input\":\"Hello Maya\""));
        assert!(json.contains("\"response_format\":\"mp3\""));
    }
}
