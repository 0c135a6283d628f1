//! Per-upstream circuit breaker
//!
//! Tracks consecutive failures against each external service and
//! short-circuits to the fallback path while an upstream is unhealthy.
//! After a cooldown the breaker enters a half-open state where a single
//! probe request decides whether to restore or re-trip the circuit.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// External services guarded by a breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Llm,
    Tts,
}

impl Upstream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Upstream::Llm => "llm",
            Upstream::Tts => "tts",
        }
    }
}

/// Breaker state for a single upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Healthy; requests flow
    Closed,
    /// Tripped; requests short-circuit until cooldown elapses
    Open,
    /// Cooldown elapsed; one probe allowed
    HalfOpen,
}

#[derive(Debug, Clone)]
struct UpstreamHealth {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for UpstreamHealth {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Breaker tuning
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures within `failure_window` before tripping
    pub failure_threshold: u32,
    /// Failures older than this no longer count as consecutive
    pub failure_window: Duration,
    /// Time in Open before allowing a half-open probe
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Circuit breaker over a set of upstreams
pub struct CircuitBreaker {
    config: BreakerConfig,
    upstreams: Mutex<HashMap<Upstream, UpstreamHealth>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            upstreams: Mutex::new(HashMap::new()),
        }
    }

    /// Record a successful request; restores Closed from any state
    pub fn record_success(&self, upstream: Upstream) {
        let mut map = self.upstreams.lock();
        let health = map.entry(upstream).or_default();
        if health.state != BreakerState::Closed {
            tracing::info!(target: "breaker", upstream = upstream.as_str(), "circuit closed");
        }
        health.state = BreakerState::Closed;
        health.consecutive_failures = 0;
    }

    /// Record a failed request; trips the circuit at the threshold
    pub fn record_failure(&self, upstream: Upstream) {
        let mut map = self.upstreams.lock();
        let health = map.entry(upstream).or_default();

        // A stale failure run does not count as consecutive.
        let stale = health
            .last_failure_at
            .is_some_and(|t| t.elapsed() > self.config.failure_window);
        if stale {
            health.consecutive_failures = 0;
        }

        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if health.consecutive_failures >= self.config.failure_threshold
            && health.state == BreakerState::Closed
        {
            health.state = BreakerState::Open;
            tracing::warn!(
                target: "breaker",
                upstream = upstream.as_str(),
                failures = health.consecutive_failures,
                "circuit opened"
            );
        } else if health.state == BreakerState::HalfOpen {
            // Probe failed; re-trip.
            health.state = BreakerState::Open;
            tracing::warn!(target: "breaker", upstream = upstream.as_str(), "probe failed, circuit re-opened");
        }
    }

    /// Whether a request should be attempted right now
    ///
    /// Open transitions to HalfOpen once the cooldown elapses; the caller
    /// that observes the transition owns the probe.
    pub fn should_attempt(&self, upstream: Upstream) -> bool {
        let mut map = self.upstreams.lock();
        let health = map.entry(upstream).or_default();

        match health.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let cooled = health
                    .last_failure_at
                    .map_or(true, |t| t.elapsed() >= self.config.cooldown);
                if cooled {
                    health.state = BreakerState::HalfOpen;
                    tracing::info!(target: "breaker", upstream = upstream.as_str(), "circuit half-open");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current state without side effects
    pub fn state(&self, upstream: Upstream) -> BreakerState {
        self.upstreams
            .lock()
            .get(&upstream)
            .map_or(BreakerState::Closed, |h| h.state)
    }

    /// Snapshot for the operator endpoint
    pub fn report(&self) -> Vec<(Upstream, BreakerState, u32)> {
        self.upstreams
            .lock()
            .iter()
            .map(|(u, h)| (*u, h.state, h.consecutive_failures))
            .collect()
    }
}

/// The process-wide breaker pair, one per upstream family
pub struct UpstreamBreakers {
    inner: CircuitBreaker,
}

impl UpstreamBreakers {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: CircuitBreaker::new(config),
        }
    }

    pub fn llm(&self) -> BreakerHandle<'_> {
        BreakerHandle { breaker: &self.inner, upstream: Upstream::Llm }
    }

    pub fn tts(&self) -> BreakerHandle<'_> {
        BreakerHandle { breaker: &self.inner, upstream: Upstream::Tts }
    }

    pub fn report(&self) -> Vec<(Upstream, BreakerState, u32)> {
        self.inner.report()
    }
}

impl Default for UpstreamBreakers {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

/// Borrowed view of the breaker scoped to one upstream
pub struct BreakerHandle<'a> {
    breaker: &'a CircuitBreaker,
    upstream: Upstream,
}

impl BreakerHandle<'_> {
    pub fn should_attempt(&self) -> bool {
        self.breaker.should_attempt(self.upstream)
    }

    pub fn record_success(&self) {
        self.breaker.record_success(self.upstream)
    }

    pub fn record_failure(&self) {
        self.breaker.record_failure(self.upstream)
    }

    pub fn state(&self) -> BreakerState {
        self.breaker.state(self.upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    #[test]
    fn test_initial_state_closed() {
        let b = breaker(5, 60);
        assert_eq!(b.state(Upstream::Llm), BreakerState::Closed);
        assert!(b.should_attempt(Upstream::Llm));
    }

    #[test]
    fn test_trips_at_threshold() {
        let b = breaker(5, 60);
        for _ in 0..4 {
            b.record_failure(Upstream::Tts);
        }
        assert_eq!(b.state(Upstream::Tts), BreakerState::Closed);
        b.record_failure(Upstream::Tts);
        assert_eq!(b.state(Upstream::Tts), BreakerState::Open);
        assert!(!b.should_attempt(Upstream::Tts));
    }

    #[test]
    fn test_success_resets_failures() {
        let b = breaker(3, 60);
        b.record_failure(Upstream::Llm);
        b.record_failure(Upstream::Llm);
        b.record_success(Upstream::Llm);
        b.record_failure(Upstream::Llm);
        b.record_failure(Upstream::Llm);
        assert_eq!(b.state(Upstream::Llm), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_after_cooldown() {
        let b = breaker(1, 0);
        b.record_failure(Upstream::Llm);
        assert_eq!(b.state(Upstream::Llm), BreakerState::Open);
        // Zero cooldown means the next attempt check transitions to HalfOpen.
        assert!(b.should_attempt(Upstream::Llm));
        assert_eq!(b.state(Upstream::Llm), BreakerState::HalfOpen);
    }

    #[test]
    fn test_probe_failure_retrips() {
        let b = breaker(1, 0);
        b.record_failure(Upstream::Llm);
        let _ = b.should_attempt(Upstream::Llm); // HalfOpen
        b.record_failure(Upstream::Llm);
        assert_eq!(b.state(Upstream::Llm), BreakerState::Open);
    }

    #[test]
    fn test_probe_success_closes() {
        let b = breaker(1, 0);
        b.record_failure(Upstream::Tts);
        let _ = b.should_attempt(Upstream::Tts);
        b.record_success(Upstream::Tts);
        assert_eq!(b.state(Upstream::Tts), BreakerState::Closed);
    }

    #[test]
    fn test_upstreams_independent() {
        let b = breaker(1, 600);
        b.record_failure(Upstream::Llm);
        assert_eq!(b.state(Upstream::Llm), BreakerState::Open);
        assert_eq!(b.state(Upstream::Tts), BreakerState::Closed);
        assert!(b.should_attempt(Upstream::Tts));
    }

    #[test]
    fn test_handle_view() {
        let breakers = UpstreamBreakers::new(BreakerConfig {
            failure_threshold: 1,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(600),
        });
        breakers.llm().record_failure();
        assert!(!breakers.llm().should_attempt());
        assert!(breakers.tts().should_attempt());
        assert_eq!(breakers.report().len(), 1);
    }
}
