//! Sales conversation states
//!
//! A thirteen-state SPIN flow. The enum is closed so routing can be an
//! exhaustively checked total function; per-state timing buckets live here
//! because both the response engine (LLM deadline) and the webhook layer
//! (carrier gather timeout) key off them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Conversation phase, used for prompt framing and operator display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesPhase {
    Opening,
    Discovery,
    Presentation,
    Objection,
    Closing,
}

/// Sales conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SalesState {
    /// Greet and confirm the audio path works
    #[default]
    Greeting,
    /// Ask permission to continue
    Permission,
    /// First open discovery question
    DiscoveryOpen,
    /// Probe deeper, handle guarded answers
    DiscoveryProbe,
    /// Confirm the stated pain point
    PainConfirm,
    /// Bridge from discovery into value
    ValueBridge,
    /// Core value proposition
    ValueProposition,
    /// Deep engagement, proof points
    DeepDive,
    /// Address a stated objection
    ObjectionHandling,
    /// Multi-party / decision authority
    Authority,
    /// Follow-up consent
    FollowUp,
    /// Scheduling a concrete next step
    Scheduling,
    /// Graceful exit; terminal
    Wrapup,
}

impl SalesState {
    /// All states in flow order
    pub const ALL: [SalesState; 13] = [
        SalesState::Greeting,
        SalesState::Permission,
        SalesState::DiscoveryOpen,
        SalesState::DiscoveryProbe,
        SalesState::PainConfirm,
        SalesState::ValueBridge,
        SalesState::ValueProposition,
        SalesState::DeepDive,
        SalesState::ObjectionHandling,
        SalesState::Authority,
        SalesState::FollowUp,
        SalesState::Scheduling,
        SalesState::Wrapup,
    ];

    /// Stable numeric id, used in cache keys and the persisted call row
    pub fn id(&self) -> u8 {
        match self {
            SalesState::Greeting => 0,
            SalesState::Permission => 1,
            SalesState::DiscoveryOpen => 2,
            SalesState::DiscoveryProbe => 3,
            SalesState::PainConfirm => 4,
            SalesState::ValueBridge => 5,
            SalesState::ValueProposition => 6,
            SalesState::DeepDive => 7,
            SalesState::ObjectionHandling => 8,
            SalesState::Authority => 9,
            SalesState::FollowUp => 10,
            SalesState::Scheduling => 11,
            SalesState::Wrapup => 12,
        }
    }

    /// Inverse of [`SalesState::id`]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Phase grouping
    pub fn phase(&self) -> SalesPhase {
        match self {
            SalesState::Greeting | SalesState::Permission => SalesPhase::Opening,
            SalesState::DiscoveryOpen | SalesState::DiscoveryProbe | SalesState::PainConfirm => {
                SalesPhase::Discovery
            }
            SalesState::ValueBridge | SalesState::ValueProposition | SalesState::DeepDive => {
                SalesPhase::Presentation
            }
            SalesState::ObjectionHandling => SalesPhase::Objection,
            SalesState::Authority
            | SalesState::FollowUp
            | SalesState::Scheduling
            | SalesState::Wrapup => SalesPhase::Closing,
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SalesState::Wrapup)
    }

    /// States answered by the deterministic quick responder
    pub fn is_quick(&self) -> bool {
        matches!(
            self,
            SalesState::Greeting | SalesState::Permission | SalesState::Wrapup
        )
    }

    /// LLM deadline for replies generated in this state
    ///
    /// Simple states answer fast, presentation and objection states get
    /// more headroom for longer completions.
    pub fn llm_timeout(&self) -> Duration {
        match self {
            SalesState::Greeting
            | SalesState::Permission
            | SalesState::PainConfirm
            | SalesState::Wrapup => Duration::from_secs(4),
            SalesState::ValueProposition | SalesState::DeepDive | SalesState::ObjectionHandling => {
                Duration::from_secs(6)
            }
            _ => Duration::from_secs(5),
        }
    }

    /// Carrier-side speech gather timeout, matched to state complexity
    pub fn gather_timeout_secs(&self) -> u8 {
        match self.llm_timeout().as_secs() {
            4 => 4,
            6 => 6,
            _ => 5,
        }
    }

    /// Next state when the conversation advances linearly
    pub fn next_linear(&self) -> SalesState {
        match self {
            SalesState::Greeting => SalesState::Permission,
            SalesState::Permission => SalesState::DiscoveryOpen,
            SalesState::DiscoveryOpen => SalesState::DiscoveryProbe,
            SalesState::DiscoveryProbe => SalesState::PainConfirm,
            SalesState::PainConfirm => SalesState::ValueBridge,
            SalesState::ValueBridge => SalesState::ValueProposition,
            SalesState::ValueProposition => SalesState::DeepDive,
            SalesState::DeepDive => SalesState::Authority,
            SalesState::ObjectionHandling => SalesState::ValueProposition,
            SalesState::Authority => SalesState::FollowUp,
            SalesState::FollowUp => SalesState::Scheduling,
            SalesState::Scheduling => SalesState::Wrapup,
            SalesState::Wrapup => SalesState::Wrapup,
        }
    }

    /// Display name for logs and operator endpoints
    pub fn display_name(&self) -> &'static str {
        match self {
            SalesState::Greeting => "Greeting",
            SalesState::Permission => "Permission",
            SalesState::DiscoveryOpen => "Discovery (open)",
            SalesState::DiscoveryProbe => "Discovery (probe)",
            SalesState::PainConfirm => "Pain confirmation",
            SalesState::ValueBridge => "Value bridge",
            SalesState::ValueProposition => "Value proposition",
            SalesState::DeepDive => "Deep dive",
            SalesState::ObjectionHandling => "Objection handling",
            SalesState::Authority => "Authority",
            SalesState::FollowUp => "Follow-up",
            SalesState::Scheduling => "Scheduling",
            SalesState::Wrapup => "Wrap-up",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        for state in SalesState::ALL {
            assert_eq!(SalesState::from_id(state.id()), Some(state));
        }
        assert_eq!(SalesState::from_id(13), None);
    }

    #[test]
    fn test_timeout_buckets() {
        assert_eq!(SalesState::Greeting.llm_timeout(), Duration::from_secs(4));
        assert_eq!(SalesState::PainConfirm.llm_timeout(), Duration::from_secs(4));
        assert_eq!(SalesState::DiscoveryOpen.llm_timeout(), Duration::from_secs(5));
        assert_eq!(SalesState::Scheduling.llm_timeout(), Duration::from_secs(5));
        assert_eq!(
            SalesState::ObjectionHandling.llm_timeout(),
            Duration::from_secs(6)
        );
    }

    #[test]
    fn test_wrapup_is_absorbing() {
        assert!(SalesState::Wrapup.is_terminal());
        assert_eq!(SalesState::Wrapup.next_linear(), SalesState::Wrapup);
    }

    #[test]
    fn test_gather_timeout_tracks_complexity() {
        assert_eq!(SalesState::Greeting.gather_timeout_secs(), 4);
        assert_eq!(SalesState::ValueBridge.gather_timeout_secs(), 5);
        assert_eq!(SalesState::DeepDive.gather_timeout_secs(), 6);
    }

    #[test]
    fn test_objection_returns_to_presentation() {
        assert_eq!(
            SalesState::ObjectionHandling.next_linear(),
            SalesState::ValueProposition
        );
    }
}
