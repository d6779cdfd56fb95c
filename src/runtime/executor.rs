//! Slot-filling engine: runs the effects the transition function asks for

use super::recovery::{recover, RecoveryReason};
use super::traits::{ContextStore, Messenger};

use crate::config::EngineConfig;
use crate::message::Message;
use crate::skill::{outline_of, Delivery, Skill, SkillError, Turn};
use crate::state_machine::{
    transition, ConvState, Conversation, Effect, Event, Parsed, ProtocolDefect, SkillOutline,
    TransitionError,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Why a turn did not complete
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Skill(#[from] SkillError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Context store failed: {0}")]
    Store(String),
    #[error("Reply delivery failed: {0}")]
    Delivery(String),
    #[error("Session for `{0}` is no longer running")]
    SessionClosed(String),
}

impl From<ProtocolDefect> for TurnError {
    fn from(defect: ProtocolDefect) -> Self {
        TurnError::Transition(defect.into())
    }
}

/// Where a conversation rests once a turn completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Suspended until the user answers `parameter`
    AwaitingInput { parameter: String },
    /// `finish` ran; `context_cleared` tells whether the context was dropped
    Finished { context_cleared: bool },
}

/// A failed effect and the event that records the failure
struct Failure {
    error: TurnError,
    event: Event,
}

impl From<TurnError> for Failure {
    fn from(error: TurnError) -> Self {
        let event = Event::TurnFailed {
            message: error.to_string(),
        };
        Self { error, event }
    }
}

/// Drives one skill's conversations
pub struct Engine<M, S>
where
    M: Messenger + 'static,
    S: ContextStore + 'static,
{
    skill: Arc<dyn Skill>,
    outline: SkillOutline,
    messenger: M,
    store: S,
}

impl<M, S> Engine<M, S>
where
    M: Messenger + 'static,
    S: ContextStore + 'static,
{
    pub fn new(skill: Arc<dyn Skill>, config: &EngineConfig, messenger: M, store: S) -> Result<Self, ProtocolDefect> {
        let outline = outline_of(skill.as_ref(), config)?;
        Ok(Self {
            skill,
            outline,
            messenger,
            store,
        })
    }

    /// Stored context for `conversation_id`, or a fresh one. A context saved
    /// mid-turn is settled first.
    pub async fn load(&self, conversation_id: &str, sender_language: &str) -> Result<Conversation, TurnError> {
        let stored = self
            .store
            .load(conversation_id)
            .await
            .map_err(TurnError::Store)?;
        let Some(mut conversation) = stored else {
            return Ok(Conversation::new(conversation_id, sender_language));
        };

        let decision = recover(&conversation);
        if decision.reason != RecoveryReason::Settled {
            tracing::warn!(
                conv_id = %conversation_id,
                from = conversation.state.label(),
                to = decision.state.label(),
                reason = ?decision.reason,
                "Recovering interrupted conversation"
            );
            conversation.state = decision.state;
            self.store.save(&conversation).await.map_err(TurnError::Store)?;
        }
        Ok(conversation)
    }

    /// Begin the exchange with values a prior step already confirmed
    pub async fn start(
        &self,
        conversation: &mut Conversation,
        supplied: BTreeMap<String, Value>,
    ) -> Result<Progress, TurnError> {
        tracing::info!(
            conv_id = %conversation.id,
            skill = self.skill.name(),
            supplied = supplied.len(),
            "Starting conversation"
        );
        self.dispatch(conversation, Event::Start { supplied }).await
    }

    /// Feed one user turn. `None` re-sends the outstanding prompt.
    pub async fn advance(&self, conversation: &mut Conversation, input: Option<String>) -> Result<Progress, TurnError> {
        let event = match input {
            Some(text) => Event::UserInput { text },
            None => Event::Resume,
        };
        self.dispatch(conversation, event).await
    }

    /// Re-run the reaction or finish a stalled conversation failed on
    pub async fn retry(&self, conversation: &mut Conversation) -> Result<Progress, TurnError> {
        tracing::info!(conv_id = %conversation.id, state = conversation.state.label(), "Retrying stalled step");
        self.dispatch(conversation, Event::Retry).await
    }

    async fn dispatch(&self, conversation: &mut Conversation, event: Event) -> Result<Progress, TurnError> {
        let mut events = VecDeque::from([event]);
        let mut failure: Option<TurnError> = None;
        let mut cleared = false;

        while let Some(current) = events.pop_front() {
            let result = match transition(conversation, &self.outline, current) {
                Ok(r) => r,
                Err(e) => match failure {
                    // Surface the turn failure rather than the bookkeeping one
                    Some(original) => {
                        tracing::error!(conv_id = %conversation.id, error = %e, "Could not record turn failure");
                        return Err(original);
                    }
                    None => return Err(e.into()),
                },
            };
            *conversation = result.conversation;

            for effect in result.effects {
                let cleared_now = matches!(effect, Effect::ClearContext);
                let outcome = match effect {
                    Effect::RunFinish { queued, sent } => self.run_finish(conversation, queued, sent).await,
                    effect => self.execute_effect(conversation, effect).await.map_err(Failure::from),
                };
                match outcome {
                    Ok(Some(next)) => events.push_back(next),
                    Ok(None) => cleared |= cleared_now,
                    Err(Failure { error, event }) => {
                        tracing::warn!(
                            conv_id = %conversation.id,
                            state = conversation.state.label(),
                            error = %error,
                            "Turn failed"
                        );
                        if failure.is_none() {
                            events.push_back(event);
                            failure = Some(error);
                        }
                        break;
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        match &conversation.state {
            ConvState::AwaitingInput { parameter } => Ok(Progress::AwaitingInput {
                parameter: parameter.clone(),
            }),
            ConvState::Finished => Ok(Progress::Finished { context_cleared: false }),
            ConvState::Idle if cleared => Ok(Progress::Finished { context_cleared: true }),
            other => Err(TransitionError::InvalidTransition(format!("turn settled in {}", other.label())).into()),
        }
    }

    async fn execute_effect(&self, conversation: &Conversation, effect: Effect) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::PersistState => {
                self.store.save(conversation).await.map_err(TurnError::Store)?;
                Ok(None)
            }

            Effect::Reply { messages } => {
                tracing::debug!(conv_id = %conversation.id, count = messages.len(), "Sending reply");
                self.messenger
                    .reply(&conversation.id, &messages)
                    .await
                    .map_err(TurnError::Delivery)?;
                Ok(Some(Event::Replied))
            }

            Effect::RunParser { parameter, input } => {
                let spec = self
                    .skill
                    .parameter(&parameter)
                    .ok_or_else(|| ProtocolDefect::UndeclaredParameter(parameter.clone()))?;
                let outcome = spec.parser.parse(&input, conversation).await?;
                match &outcome {
                    Parsed::Accepted { value } => {
                        tracing::info!(conv_id = %conversation.id, parameter = %parameter, value = %value, "Answer accepted");
                    }
                    Parsed::Rejected { reason } => {
                        tracing::info!(conv_id = %conversation.id, parameter = %parameter, reason = %reason, "Answer rejected");
                    }
                }
                Ok(Some(Event::Parsed { parameter, outcome }))
            }

            Effect::RunReaction { parameter, outcome } => {
                let spec = self
                    .skill
                    .parameter(&parameter)
                    .ok_or_else(|| ProtocolDefect::UndeclaredParameter(parameter.clone()))?;
                let mut turn = Turn::default();
                spec.reaction.react(&outcome, conversation, &mut turn).await?;
                tracing::debug!(
                    conv_id = %conversation.id,
                    parameter = %parameter,
                    directives = turn.directives().len(),
                    "Reaction completed"
                );
                Ok(Some(Event::Reacted {
                    parameter,
                    directives: turn.into_directives(),
                }))
            }

            Effect::RunFinish { queued, sent } => self
                .run_finish(conversation, queued, sent)
                .await
                .map_err(|failure| failure.error),

            Effect::ClearContext => {
                self.store.clear(&conversation.id).await.map_err(TurnError::Store)?;
                tracing::debug!(conv_id = %conversation.id, "Context cleared");
                Ok(None)
            }
        }
    }

    /// A failed finish reports the deliveries that did go out so a retry
    /// skips them
    async fn run_finish(
        &self,
        conversation: &Conversation,
        queued: Vec<Message>,
        sent: BTreeSet<String>,
    ) -> Result<Option<Event>, Failure> {
        let delivery = Delivery::new(&conversation.id, queued, sent, &self.messenger);
        match self.skill.finish(conversation, &delivery).await {
            Ok(()) => {
                tracing::info!(conv_id = %conversation.id, skill = self.skill.name(), "Skill finished");
                Ok(Some(Event::FinishCompleted))
            }
            Err(e) => {
                let sent = delivery.into_sent();
                tracing::debug!(conv_id = %conversation.id, sent = ?sent, "Finish incomplete");
                let error = TurnError::from(e);
                Err(Failure {
                    event: Event::FinishFailed {
                        message: error.to_string(),
                        sent,
                    },
                    error,
                })
            }
        }
    }
}
