//! Pure state transition function
//!
//! Given the same conversation, outline and event this always produces the
//! same result. Parsers, reactions and deliveries run in the executor; their
//! outcomes come back here as events.

use super::event::Directive;
use super::state::{Conversation, ConvState, Parsed, SkillOutline, StalledStep};
use super::{Effect, Event};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub conversation: Conversation,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Engine invariant violations. These are programming errors in a skill
/// definition, not something the user can recover from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolDefect {
    #[error("parameter `{0}` is not declared by the skill")]
    UndeclaredParameter(String),
    #[error("parameter `{0}` is already confirmed")]
    AlreadyConfirmed(String),
    #[error("parameter `{0}` is declared more than once")]
    DuplicateParameter(String),
    #[error("queue drained but required parameter `{0}` is unconfirmed")]
    MissingRequired(String),
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Conversation has not started")]
    NotStarted,
    #[error("A turn is already in flight ({0})")]
    TurnInFlight(&'static str),
    #[error("Conversation is stalled, retry required: {0}")]
    Stalled(String),
    #[error("Conversation already finished")]
    AlreadyFinished,
    #[error("Protocol defect: {0}")]
    Protocol(#[from] ProtocolDefect),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    conv: &Conversation,
    outline: &SkillOutline,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (&conv.state, event) {
        // ============================================================
        // Start
        // ============================================================
        (ConvState::Idle, Event::Start { supplied }) => begin(touch(conv), outline, supplied),

        // A retained context chains into a new exchange
        (ConvState::Finished, Event::Start { supplied }) => {
            let mut next = conv.chain(outline);
            for name in supplied.keys() {
                next.confirmed.remove(name);
            }
            begin(next, outline, supplied)
        }

        (ConvState::Idle, Event::UserInput { .. } | Event::Resume) => {
            Err(TransitionError::NotStarted)
        }

        // ============================================================
        // Awaiting the user's answer
        // ============================================================
        (ConvState::AwaitingInput { parameter }, Event::UserInput { text }) => {
            let parameter = parameter.clone();
            let mut next = touch(conv);
            next.state = ConvState::Validating {
                parameter: parameter.clone(),
            };
            Ok(TransitionResult::new(next).with_effect(Effect::run_parser(parameter, text)))
        }

        (ConvState::AwaitingInput { parameter }, Event::Resume) => {
            let Some(prompt) = conv.prompt_for(parameter, outline).cloned() else {
                return Ok(TransitionResult::new(conv.clone()));
            };
            let next = touch(conv);
            let queued = next.outbox.clone();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effect(Effect::prompt(queued, prompt)))
        }

        // Queued messages are dropped only once the reply carrying them went out
        (ConvState::AwaitingInput { .. }, Event::Replied) => {
            if conv.outbox.is_empty() {
                return Ok(TransitionResult::new(conv.clone()));
            }
            let mut next = touch(conv);
            next.outbox.clear();
            Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
        }

        // A failed prompt delivery leaves the question and the outbox outstanding
        (ConvState::AwaitingInput { .. }, Event::TurnFailed { .. }) => {
            Ok(TransitionResult::new(conv.clone()))
        }

        // ============================================================
        // Parser finished
        // ============================================================
        (ConvState::Validating { parameter }, Event::Parsed { parameter: parsed, outcome })
            if *parameter == parsed =>
        {
            let mut next = touch(conv);
            if let Parsed::Accepted { value } = &outcome {
                confirm(&mut next, outline, &parsed, value.clone())?;
                next.pending.remove(&parsed);
            }
            next.state = ConvState::Reacting {
                parameter: parsed.clone(),
                outcome: outcome.clone(),
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistState)
                .with_effect(Effect::run_reaction(parsed, outcome)))
        }

        // Parser failed: nothing was confirmed, keep asking the same parameter
        (ConvState::Validating { parameter }, Event::TurnFailed { .. }) => {
            let mut next = touch(conv);
            next.state = ConvState::AwaitingInput {
                parameter: parameter.clone(),
            };
            Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
        }

        // ============================================================
        // Reaction finished
        // ============================================================
        (
            ConvState::Reacting { parameter, outcome },
            Event::Reacted {
                parameter: reacted,
                directives,
            },
        ) if *parameter == reacted => {
            let mut next = touch(conv);
            let mut reprompt = false;
            for directive in directives {
                match directive {
                    Directive::Collect(name) => {
                        if !outline.declares(&name) {
                            return Err(ProtocolDefect::UndeclaredParameter(name).into());
                        }
                        if next.is_confirmed(&name) {
                            return Err(ProtocolDefect::AlreadyConfirmed(name).into());
                        }
                        next.pending.push(name);
                    }
                    Directive::OverridePrompt { parameter, message } => {
                        if !outline.declares(&parameter) {
                            return Err(ProtocolDefect::UndeclaredParameter(parameter).into());
                        }
                        next.prompt_overrides.insert(parameter, message);
                    }
                    Directive::Queue(message) => next.outbox.push(message),
                    Directive::Remember { key, value } => {
                        next.scratch.insert(key, value);
                    }
                    Directive::Reprompt => reprompt = true,
                }
            }

            // A rejected answer resolves silently unless the reaction asked again
            let silent = (outcome.is_rejected() && !reprompt).then_some(reacted.as_str());
            ask_next(next, outline, silent)
        }

        (ConvState::Reacting { parameter, outcome }, Event::TurnFailed { message }) => {
            let mut next = touch(conv);
            next.state = ConvState::Stalled {
                step: StalledStep::Reaction {
                    parameter: parameter.clone(),
                    outcome: outcome.clone(),
                },
                message,
            };
            Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
        }

        // ============================================================
        // Finish
        // ============================================================
        (ConvState::Finishing, Event::FinishCompleted) => {
            if outline.clear_on_finish() {
                Ok(TransitionResult::new(conv.reset()).with_effect(Effect::ClearContext))
            } else {
                let mut next = touch(conv);
                next.state = ConvState::Finished;
                next.outbox.clear();
                Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
            }
        }

        (ConvState::Finishing, Event::FinishFailed { message, sent }) => {
            let mut next = touch(conv);
            next.state = ConvState::Stalled {
                step: StalledStep::Finish { sent },
                message,
            };
            Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
        }

        (ConvState::Finishing, Event::TurnFailed { message }) => {
            let mut next = touch(conv);
            next.state = ConvState::Stalled {
                step: StalledStep::Finish {
                    sent: BTreeSet::new(),
                },
                message,
            };
            Ok(TransitionResult::new(next).with_effect(Effect::PersistState))
        }

        // ============================================================
        // Recovery
        // ============================================================
        (ConvState::Stalled { step, .. }, Event::Retry) => {
            let mut next = touch(conv);
            match step {
                StalledStep::Reaction { parameter, outcome } => {
                    next.state = ConvState::Reacting {
                        parameter: parameter.clone(),
                        outcome: outcome.clone(),
                    };
                    Ok(TransitionResult::new(next)
                        .with_effect(Effect::PersistState)
                        .with_effect(Effect::run_reaction(parameter.clone(), outcome.clone())))
                }
                StalledStep::Finish { sent } => {
                    next.state = ConvState::Finishing;
                    let queued = next.outbox.clone();
                    Ok(TransitionResult::new(next)
                        .with_effect(Effect::PersistState)
                        .with_effect(Effect::RunFinish {
                            queued,
                            sent: sent.clone(),
                        }))
                }
            }
        }

        (ConvState::Stalled { message, .. }, Event::UserInput { .. } | Event::Resume) => {
            Err(TransitionError::Stalled(message.clone()))
        }

        // ============================================================
        // Rejections
        // ============================================================
        (state, Event::UserInput { .. } | Event::Resume) if state.is_busy() => {
            Err(TransitionError::TurnInFlight(state.label()))
        }

        (ConvState::Finished, Event::UserInput { .. } | Event::Resume) => {
            Err(TransitionError::AlreadyFinished)
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} + {event:?}",
            state.label()
        ))),
    }
}

/// Confirm the supplied values, queue every unconfirmed required parameter
/// and ask the first
fn begin(
    mut next: Conversation,
    outline: &SkillOutline,
    supplied: BTreeMap<String, Value>,
) -> Result<TransitionResult, TransitionError> {
    for (name, value) in supplied {
        confirm(&mut next, outline, &name, value)?;
    }
    for name in outline.required() {
        if !next.is_confirmed(name) {
            next.pending.push(name);
        }
    }
    ask_next(next, outline, None)
}

/// Record an accepted value, enforcing the declare-once/confirm-once rules
fn confirm(
    conv: &mut Conversation,
    outline: &SkillOutline,
    name: &str,
    value: Value,
) -> Result<(), ProtocolDefect> {
    if !outline.declares(name) {
        return Err(ProtocolDefect::UndeclaredParameter(name.to_string()));
    }
    if conv.is_confirmed(name) {
        return Err(ProtocolDefect::AlreadyConfirmed(name.to_string()));
    }
    conv.confirmed.insert(name.to_string(), value);
    Ok(())
}

/// Move to the next outstanding parameter, or to finishing when none remain.
/// `silent` names a parameter that stays outstanding without a re-prompt.
fn ask_next(
    mut next: Conversation,
    outline: &SkillOutline,
    silent: Option<&str>,
) -> Result<TransitionResult, TransitionError> {
    if let Some(head) = next.pending.front().map(str::to_string) {
        let prompt = if silent == Some(head.as_str()) {
            None
        } else {
            next.prompt_for(&head, outline).cloned()
        };
        next.state = ConvState::AwaitingInput { parameter: head };
        let queued = next.outbox.clone();

        let mut result = TransitionResult::new(next).with_effect(Effect::PersistState);
        if let Some(prompt) = prompt {
            result = result.with_effect(Effect::prompt(queued, prompt));
        }
        return Ok(result);
    }

    if let Some(missing) = outline.required().find(|name| !next.is_confirmed(name)) {
        return Err(ProtocolDefect::MissingRequired(missing.to_string()).into());
    }

    // The outbox is kept until finish completes so a retry resends it
    next.state = ConvState::Finishing;
    let queued = next.outbox.clone();
    Ok(TransitionResult::new(next)
        .with_effect(Effect::PersistState)
        .with_effect(Effect::RunFinish {
            queued,
            sent: BTreeSet::new(),
        }))
}

fn touch(conv: &Conversation) -> Conversation {
    let mut next = conv.clone();
    next.updated_at = Utc::now();
    next
}
