//! Conversation recovery logic
//!
//! A context loaded from the store may have been saved mid-turn by a process
//! that died before the turn completed. Such contexts are settled into a state
//! the host can act on.

use crate::state_machine::{ConvState, Conversation, StalledStep};
use std::collections::BTreeSet;

/// Result of inspecting a loaded conversation
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryDecision {
    /// The state to resume with
    pub state: ConvState,
    pub reason: RecoveryReason,
}

/// Why we made a particular recovery decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// Saved between turns, nothing to do
    Settled,
    /// Parser was running; the answer is lost, ask again
    InterruptedParse,
    /// Reaction was running; confirmed answers are kept, retry re-runs it
    InterruptedReaction,
    /// Finish was running; retry re-runs it
    InterruptedFinish,
}

const INTERRUPTED: &str = "interrupted by restart";

/// Decide which state a loaded conversation resumes in
pub fn recover(conversation: &Conversation) -> RecoveryDecision {
    match &conversation.state {
        ConvState::Validating { parameter } => RecoveryDecision {
            state: ConvState::AwaitingInput {
                parameter: parameter.clone(),
            },
            reason: RecoveryReason::InterruptedParse,
        },
        ConvState::Reacting { parameter, outcome } => RecoveryDecision {
            state: ConvState::Stalled {
                step: StalledStep::Reaction {
                    parameter: parameter.clone(),
                    outcome: outcome.clone(),
                },
                message: INTERRUPTED.to_string(),
            },
            reason: RecoveryReason::InterruptedReaction,
        },
        ConvState::Finishing => RecoveryDecision {
            // Which deliveries went out before the restart is unknown
            state: ConvState::Stalled {
                step: StalledStep::Finish {
                    sent: BTreeSet::new(),
                },
                message: INTERRUPTED.to_string(),
            },
            reason: RecoveryReason::InterruptedFinish,
        },
        settled => RecoveryDecision {
            state: settled.clone(),
            reason: RecoveryReason::Settled,
        },
    }
}
