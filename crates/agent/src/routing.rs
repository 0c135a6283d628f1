//! State routing
//!
//! Applied before reply generation. A total function: every combination of
//! current state and detected intents yields a defined next state plus a
//! directive telling the engine what kind of reply to produce. The
//! wrap-up state is absorbing.

use salesline_core::SalesState;

use crate::conversation::ConversationState;
use crate::intent::{detect_objection, IntentFlags};
use crate::response_cache::normalize;

/// What the engine should generate for this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDirective {
    /// Generate normally for the routed state
    Generate,
    /// One-turn identification reply; the state does not advance
    Identify,
    /// Audio-repair phrase; the state does not advance
    Repair,
    /// Gentle re-prompt after an empty utterance
    Reprompt,
}

/// Routing decision for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub next: SalesState,
    pub directive: ReplyDirective,
}

fn outcome(next: SalesState, directive: ReplyDirective) -> RouteOutcome {
    RouteOutcome { next, directive }
}

/// An answer that actually engages with the question: at least three
/// words and not a deflection.
fn substantive(user_text: &str, flags: &IntentFlags) -> bool {
    !flags.guarded && normalize(user_text).split(' ').filter(|w| !w.is_empty()).count() >= 3
}

/// Route one turn. Mutates the conversation counters the rules depend on
/// (tech-issue cap, objection count, objection return state).
pub fn route(
    conv: &mut ConversationState,
    flags: &IntentFlags,
    user_text: &str,
) -> RouteOutcome {
    let cur = conv.state;

    // Wrap-up is absorbing; a hangup observed via the status webhook also
    // pins the conversation there.
    if cur.is_terminal() || conv.end_call {
        return outcome(SalesState::Wrapup, ReplyDirective::Generate);
    }

    // 1. Hostile or hard refusal exits from anywhere.
    if flags.hard_exit() {
        return outcome(SalesState::Wrapup, ReplyDirective::Generate);
    }

    // 2. "Who is this" gets a one-turn identification without advancing.
    if flags.who_is_this {
        return outcome(cur, ReplyDirective::Identify);
    }

    // 3. Audio problems: repair up to the cap, then give up gracefully.
    if flags.tech_issue {
        return if conv.register_tech_issue() {
            outcome(SalesState::Wrapup, ReplyDirective::Generate)
        } else {
            outcome(cur, ReplyDirective::Repair)
        };
    }

    // 4. "No time" exits politely, except at the greeting where a shorter
    //    path is offered.
    if flags.no_time {
        return if cur == SalesState::Greeting {
            outcome(SalesState::Permission, ReplyDirective::Generate)
        } else {
            outcome(SalesState::Wrapup, ReplyDirective::Generate)
        };
    }

    // 5. Permission gate.
    if cur == SalesState::Permission {
        if flags.permission_no {
            return outcome(SalesState::Wrapup, ReplyDirective::Generate);
        }
        if flags.permission_yes {
            return outcome(SalesState::DiscoveryOpen, ReplyDirective::Generate);
        }
    }

    // 6. Objections during presentation; resolution returns to where the
    //    presentation left off.
    if matches!(cur, SalesState::ValueProposition | SalesState::DeepDive)
        && detect_objection(user_text)
    {
        conv.return_state = Some(cur);
        return outcome(SalesState::ObjectionHandling, ReplyDirective::Generate);
    }
    if cur == SalesState::ObjectionHandling && (flags.confirm_yes || flags.resonance) {
        let back = conv.return_state.take().unwrap_or(SalesState::ValueProposition);
        return outcome(back, ReplyDirective::Generate);
    }

    // 7. Scheduling shortcuts once the pitch has landed.
    if flags.schedule && cur.id() >= SalesState::ValueProposition.id() {
        return outcome(SalesState::Scheduling, ReplyDirective::Generate);
    }
    if cur == SalesState::Scheduling && flags.permission_no {
        return outcome(SalesState::FollowUp, ReplyDirective::Generate);
    }
    if cur == SalesState::FollowUp && flags.permission_no {
        return outcome(SalesState::Wrapup, ReplyDirective::Generate);
    }

    // 8. Momentum transitions.
    if cur == SalesState::PainConfirm && flags.confirm_yes {
        return outcome(SalesState::ValueBridge, ReplyDirective::Generate);
    }
    if cur == SalesState::ValueProposition && (flags.resonance || flags.confirm_yes) {
        return outcome(SalesState::DeepDive, ReplyDirective::Generate);
    }
    if cur == SalesState::DeepDive && flags.hesitation {
        return outcome(SalesState::FollowUp, ReplyDirective::Generate);
    }

    // An empty utterance is "no response": stay and gently re-prompt.
    if normalize(user_text).is_empty() {
        return outcome(cur, ReplyDirective::Reprompt);
    }

    // 9. Advance linearly when the exit predicate holds, else stay.
    if substantive(user_text, flags) {
        outcome(cur.next_linear(), ReplyDirective::Generate)
    } else {
        outcome(cur, ReplyDirective::Generate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentDetector;
    use salesline_core::{ChannelTone, Lead};
    use uuid::Uuid;

    fn conv(state: SalesState) -> ConversationState {
        let lead = Lead {
            id: Uuid::new_v4(),
            name: "Maya Chen".into(),
            company: None,
            title: None,
            industry: None,
            phone: "+15550100".into(),
            notes: None,
        };
        let mut conv = ConversationState::new(ChannelTone::ColdCall, &lead);
        conv.state = state;
        conv
    }

    fn route_text(state: SalesState, text: &str) -> (RouteOutcome, ConversationState) {
        let mut c = conv(state);
        let flags = IntentDetector::new().detect(text);
        let out = route(&mut c, &flags, text);
        (out, c)
    }

    #[test]
    fn test_hostile_forces_wrapup_from_any_state() {
        for state in SalesState::ALL {
            let (out, _) = route_text(state, "stop calling me you scammers");
            assert_eq!(out.next, SalesState::Wrapup, "from {state:?}");
        }
    }

    #[test]
    fn test_wrapup_is_absorbing() {
        let (out, _) = route_text(SalesState::Wrapup, "actually tell me more");
        assert_eq!(out.next, SalesState::Wrapup);
    }

    #[test]
    fn test_who_is_this_does_not_advance() {
        let (out, _) = route_text(SalesState::ValueProposition, "wait, who is this?");
        assert_eq!(out.next, SalesState::ValueProposition);
        assert_eq!(out.directive, ReplyDirective::Identify);
    }

    #[test]
    fn test_tech_issue_repairs_twice_then_exits() {
        let mut c = conv(SalesState::DiscoveryOpen);
        let flags = IntentDetector::new().detect("you're breaking up");

        let out = route(&mut c, &flags, "you're breaking up");
        assert_eq!(out.directive, ReplyDirective::Repair);
        let out = route(&mut c, &flags, "you're breaking up");
        assert_eq!(out.directive, ReplyDirective::Repair);
        assert_eq!(c.tech_issue_count, 2);

        let out = route(&mut c, &flags, "you're breaking up");
        assert_eq!(out.next, SalesState::Wrapup);
        assert_eq!(c.tech_issue_count, 2);
    }

    #[test]
    fn test_no_time_at_greeting_offers_shorter_path() {
        let (out, _) = route_text(SalesState::Greeting, "I really have no time right now");
        assert_eq!(out.next, SalesState::Permission);
    }

    #[test]
    fn test_no_time_elsewhere_exits() {
        let (out, _) = route_text(SalesState::DeepDive, "sorry, no time for this");
        assert_eq!(out.next, SalesState::Wrapup);
    }

    #[test]
    fn test_permission_granted_moves_to_discovery() {
        let (out, _) = route_text(SalesState::Permission, "sure, go ahead");
        assert_eq!(out.next, SalesState::DiscoveryOpen);
    }

    #[test]
    fn test_permission_denied_exits() {
        let (out, _) = route_text(SalesState::Permission, "no");
        assert_eq!(out.next, SalesState::Wrapup);
    }

    #[test]
    fn test_objection_reroutes_and_returns() {
        let mut c = conv(SalesState::DeepDive);
        let detector = IntentDetector::new();

        let text = "we already use Competitor X";
        let flags = detector.detect(text);
        c.observe_user_text(text, &flags);
        let out = route(&mut c, &flags, text);
        assert_eq!(out.next, SalesState::ObjectionHandling);
        assert_eq!(c.objection_count, 1);
        c.enter(out.next);

        let text = "okay that makes sense";
        let flags = detector.detect(text);
        let out = route(&mut c, &flags, text);
        assert_eq!(out.next, SalesState::DeepDive);
    }

    #[test]
    fn test_schedule_intent_jumps_to_scheduling() {
        let (out, _) = route_text(SalesState::DeepDive, "can we set up a demo next Tuesday?");
        assert_eq!(out.next, SalesState::Scheduling);
    }

    #[test]
    fn test_schedule_intent_ignored_early() {
        let (out, _) = route_text(SalesState::DiscoveryOpen, "is this about scheduling something");
        assert_ne!(out.next, SalesState::Scheduling);
    }

    #[test]
    fn test_scheduling_declined_falls_back_to_follow_up() {
        let (out, _) = route_text(SalesState::Scheduling, "no");
        assert_eq!(out.next, SalesState::FollowUp);
    }

    #[test]
    fn test_follow_up_declined_exits() {
        let (out, _) = route_text(SalesState::FollowUp, "no");
        assert_eq!(out.next, SalesState::Wrapup);
    }

    #[test]
    fn test_pain_confirmed_advances() {
        let (out, _) = route_text(SalesState::PainConfirm, "yes exactly");
        assert_eq!(out.next, SalesState::ValueBridge);
    }

    #[test]
    fn test_resonance_deepens_presentation() {
        let (out, _) = route_text(SalesState::ValueProposition, "that makes sense");
        assert_eq!(out.next, SalesState::DeepDive);
    }

    #[test]
    fn test_hesitation_at_deep_dive_goes_to_follow_up() {
        let (out, _) = route_text(SalesState::DeepDive, "hmm, I'm not sure about this");
        assert_eq!(out.next, SalesState::FollowUp);
    }

    #[test]
    fn test_empty_utterance_reprompts() {
        let (out, _) = route_text(SalesState::DiscoveryOpen, "");
        assert_eq!(out.next, SalesState::DiscoveryOpen);
        assert_eq!(out.directive, ReplyDirective::Reprompt);
    }

    #[test]
    fn test_substantive_answer_advances_linearly() {
        let (out, _) = route_text(
            SalesState::DiscoveryOpen,
            "we mostly handle it with spreadsheets today",
        );
        assert_eq!(out.next, SalesState::DiscoveryProbe);
    }

    #[test]
    fn test_short_answer_stays() {
        let (out, _) = route_text(SalesState::DiscoveryOpen, "spreadsheets");
        assert_eq!(out.next, SalesState::DiscoveryOpen);
    }

    #[test]
    fn test_routing_is_total() {
        // Every state accepts every flag combination without panicking.
        let detector = IntentDetector::new();
        let utterances = [
            "",
            "no",
            "sure, go ahead",
            "who is this",
            "you're breaking up",
            "stop calling me",
            "we already use Competitor X",
            "can we schedule a demo",
            "we struggle with manual work every single day",
        ];
        for state in SalesState::ALL {
            for text in utterances {
                let mut c = conv(state);
                let flags = detector.detect(text);
                let out = route(&mut c, &flags, text);
                assert!(SalesState::ALL.contains(&out.next));
            }
        }
    }
}
