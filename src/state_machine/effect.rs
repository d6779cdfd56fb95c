//! Effects produced by state transitions

use super::state::Parsed;
use crate::message::Message;
use std::collections::BTreeSet;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Persist the conversation
    PersistState,

    /// Send messages to the current user right away (queued messages first)
    Reply { messages: Vec<Message> },

    /// Run the parser of `parameter` over `input`
    RunParser { parameter: String, input: String },

    /// Run the reaction of `parameter` for `outcome`
    RunReaction { parameter: String, outcome: Parsed },

    /// Run the skill's finish routine; `queued` is flushed with its reply.
    /// Deliveries keyed in `sent` went out on an earlier attempt and are skipped.
    RunFinish {
        queued: Vec<Message>,
        sent: BTreeSet<String>,
    },

    /// Drop the conversation from the context store
    ClearContext,
}

impl Effect {
    pub fn prompt(queued: Vec<Message>, prompt: Message) -> Self {
        let mut messages = queued;
        messages.push(prompt);
        Effect::Reply { messages }
    }

    pub fn run_parser(parameter: impl Into<String>, input: impl Into<String>) -> Self {
        Effect::RunParser {
            parameter: parameter.into(),
            input: input.into(),
        }
    }

    pub fn run_reaction(parameter: impl Into<String>, outcome: Parsed) -> Self {
        Effect::RunReaction {
            parameter: parameter.into(),
            outcome,
        }
    }
}
