//! Per-turn latency tracking
//!
//! One tracker is created at turn-handler entry; each pipeline stage marks
//! itself as it completes. Marks are O(1) array writes. A single structured
//! event is emitted when the turn finishes.

use std::time::Instant;
use uuid::Uuid;

use crate::call::ReplySource;

/// Stages marked along the turn critical path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    PromptBuilt,
    LlmFirstToken,
    LlmDone,
    TtsDone,
    PersistDone,
}

impl TurnStage {
    fn index(&self) -> usize {
        match self {
            TurnStage::PromptBuilt => 0,
            TurnStage::LlmFirstToken => 1,
            TurnStage::LlmDone => 2,
            TurnStage::TtsDone => 3,
            TurnStage::PersistDone => 4,
        }
    }
}

/// Stage timing marks for one turn
pub struct LatencyTracker {
    call_id: Uuid,
    started: Instant,
    marks_ms: [Option<u64>; 5],
}

impl LatencyTracker {
    pub fn new(call_id: Uuid) -> Self {
        Self {
            call_id,
            started: Instant::now(),
            marks_ms: [None; 5],
        }
    }

    /// Record a stage completion relative to turn start
    pub fn mark(&mut self, stage: TurnStage) {
        self.marks_ms[stage.index()] = Some(self.started.elapsed().as_millis() as u64);
    }

    /// Record an externally measured offset, e.g. time-to-first-token
    /// reported by the LLM client
    pub fn set_stage_ms(&mut self, stage: TurnStage, ms: u64) {
        self.marks_ms[stage.index()] = Some(ms);
    }

    /// Milliseconds from turn start to a marked stage
    pub fn stage_ms(&self, stage: TurnStage) -> Option<u64> {
        self.marks_ms[stage.index()]
    }

    /// Total elapsed milliseconds so far
    pub fn total_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Emit the per-turn latency event and return the total
    pub fn finish(&self, source: ReplySource) -> u64 {
        let total_ms = self.total_ms();
        tracing::info!(
            target: "latency",
            call_id = %self.call_id,
            source = source.as_str(),
            prompt_ms = self.marks_ms[0],
            llm_first_token_ms = self.marks_ms[1],
            llm_ms = self.marks_ms[2],
            tts_ms = self.marks_ms[3],
            persist_ms = self.marks_ms[4],
            total_ms,
            "turn complete"
        );
        total_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_are_monotone() {
        let mut t = LatencyTracker::new(Uuid::new_v4());
        t.mark(TurnStage::PromptBuilt);
        std::thread::sleep(std::time::Duration::from_millis(2));
        t.mark(TurnStage::LlmDone);
        let prompt = t.stage_ms(TurnStage::PromptBuilt).unwrap();
        let llm = t.stage_ms(TurnStage::LlmDone).unwrap();
        assert!(llm >= prompt);
        assert!(t.total_ms() >= llm);
    }

    #[test]
    fn test_unmarked_stage_is_none() {
        let t = LatencyTracker::new(Uuid::new_v4());
        assert_eq!(t.stage_ms(TurnStage::TtsDone), None);
    }

    #[test]
    fn test_finish_returns_total() {
        let mut t = LatencyTracker::new(Uuid::new_v4());
        t.mark(TurnStage::PromptBuilt);
        let total = t.finish(ReplySource::Quick);
        assert!(total < 1000);
    }
}
