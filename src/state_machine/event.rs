//! Events that can occur in a conversation

use super::state::Parsed;
use crate::message::Message;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Host events
    /// Begin an exchange; `supplied` holds values a prior step already confirmed.
    /// Accepted from `Idle`, and from `Finished` to chain a retained context.
    Start { supplied: BTreeMap<String, Value> },
    /// Raw answer from the user
    UserInput { text: String },
    /// Re-send the current prompt without consuming input
    Resume,
    /// Re-run the step a stalled conversation failed on
    Retry,

    // Executor events
    Parsed { parameter: String, outcome: Parsed },
    Reacted {
        parameter: String,
        directives: Vec<Directive>,
    },
    /// The prompt and the queued messages before it went out
    Replied,
    FinishCompleted,
    /// Finish failed after making the deliveries keyed in `sent`
    FinishFailed {
        message: String,
        sent: BTreeSet<String>,
    },
    /// A parser, reaction or delivery failed
    TurnFailed { message: String },
}

/// Instruction recorded by a reaction, applied by the transition function
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Enqueue a declared parameter to ask later
    Collect(String),
    /// Replace a parameter's prompt for the rest of the conversation
    OverridePrompt { parameter: String, message: Message },
    /// Queue a message for the next reply
    Queue(Message),
    /// Stash a value for a later step
    Remember { key: String, value: Value },
    /// Ask the current parameter again after a rejection
    Reprompt,
}
