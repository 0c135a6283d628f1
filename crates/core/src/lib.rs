//! Core types for the outbound sales voice agent
//!
//! This crate provides foundational types used across all other crates:
//! - Call, lead, and turn records
//! - The sales state enumeration and its timing buckets
//! - Error taxonomy shared by every upstream-facing crate
//! - Circuit breaker and retry policy for upstream calls
//! - Per-turn latency tracking

pub mod breaker;
pub mod call;
pub mod error;
pub mod latency;
pub mod retry;
pub mod state;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, Upstream, UpstreamBreakers};
pub use call::{Call, CallStatus, ChannelTone, Lead, ReplySource, Turn};
pub use error::{Error, ErrorKind, Result};
pub use latency::{LatencyTracker, TurnStage};
pub use retry::RetryPolicy;
pub use state::{SalesPhase, SalesState};
