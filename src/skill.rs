//! Skill definitions
//!
//! A skill declares the parameters it needs (required ones up front,
//! optional ones enqueued at runtime by reactions), how each answer is
//! parsed and reacted to, and what happens once everything is confirmed.

pub mod human_response;
pub mod intent_menu;
pub mod parsers;

pub use human_response::HumanResponseSkill;
pub use parsers::{AcceptAny, NluChoice, NumericSelection};

use crate::config::EngineConfig;
use crate::message::Message;
use crate::nlu::NluError;
use crate::runtime::Messenger;
use crate::state_machine::{Conversation, Directive, Parsed, ProtocolDefect, SkillOutline};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Failures raised by parsers, reactions and finish routines
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("NLU backend unavailable: {0}")]
    Backend(#[from] NluError),
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Confirmed value `{0}` is missing or malformed")]
    MissingValue(String),
    #[error("Scratch value `{0}` is missing or malformed")]
    MissingScratch(String),
}

// ============================================================================
// Parsers and reactions
// ============================================================================

/// Validates and normalizes a raw answer. Reads the conversation for
/// cross-field checks but never mutates it.
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, value: &str, conversation: &Conversation) -> Result<Parsed, SkillError>;
}

/// Side effect run after a parser accepted or rejected an answer
#[async_trait]
pub trait Reaction: Send + Sync {
    async fn react(
        &self,
        outcome: &Parsed,
        conversation: &Conversation,
        turn: &mut Turn,
    ) -> Result<(), SkillError>;
}

/// Reaction that does nothing
pub struct NoReaction;

#[async_trait]
impl Reaction for NoReaction {
    async fn react(&self, _: &Parsed, _: &Conversation, _: &mut Turn) -> Result<(), SkillError> {
        Ok(())
    }
}

/// Directives a reaction records for the engine to apply
#[derive(Debug, Default)]
pub struct Turn {
    directives: Vec<Directive>,
}

impl Turn {
    /// Ask `parameter` after everything already pending
    pub fn collect(&mut self, parameter: impl Into<String>) {
        self.directives.push(Directive::Collect(parameter.into()));
    }

    pub fn override_prompt(&mut self, parameter: impl Into<String>, message: Message) {
        self.directives.push(Directive::OverridePrompt {
            parameter: parameter.into(),
            message,
        });
    }

    /// Send `message` together with the next reply
    pub fn queue(&mut self, message: Message) {
        self.directives.push(Directive::Queue(message));
    }

    pub fn remember(&mut self, key: impl Into<String>, value: Value) {
        self.directives.push(Directive::Remember {
            key: key.into(),
            value,
        });
    }

    /// Ask the rejected parameter again instead of waiting silently
    pub fn reprompt(&mut self) {
        self.directives.push(Directive::Reprompt);
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn into_directives(self) -> Vec<Directive> {
        self.directives
    }
}

// ============================================================================
// Parameter spec
// ============================================================================

/// Declarative description of one slot to fill
#[derive(Clone)]
pub struct ParameterSpec {
    pub name: String,
    /// Prompt sent when the parameter is asked; `None` when a prior step
    /// supplies the value
    pub message_to_confirm: Option<Message>,
    pub parser: Arc<dyn Parser>,
    pub reaction: Arc<dyn Reaction>,
}

impl ParameterSpec {
    /// Parameter accepting any answer verbatim, with no reaction
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message_to_confirm: None,
            parser: Arc::new(AcceptAny),
            reaction: Arc::new(NoReaction),
        }
    }

    pub fn with_prompt(mut self, message: Message) -> Self {
        self.message_to_confirm = Some(message);
        self
    }

    pub fn with_parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn with_reaction(mut self, reaction: impl Reaction + 'static) -> Self {
        self.reaction = Arc::new(reaction);
        self
    }
}

impl std::fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("name", &self.name)
            .field("message_to_confirm", &self.message_to_confirm)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Skill
// ============================================================================

/// A slot-filling skill
#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    /// Parameters that must all be confirmed, asked in this order
    fn required(&self) -> &[ParameterSpec];

    /// Parameters asked only when a reaction collects them
    fn optional(&self) -> &[ParameterSpec];

    /// Whether the conversation is reset once `finish` completes
    fn clear_context_on_finish(&self) -> bool {
        true
    }

    /// Terminal action, run once every required parameter is confirmed
    async fn finish(&self, conversation: &Conversation, delivery: &Delivery<'_>) -> Result<(), SkillError>;

    fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.required()
            .iter()
            .chain(self.optional())
            .find(|p| p.name == name)
    }
}

/// Derive the transition function's view of `skill`
pub fn outline_of(skill: &dyn Skill, config: &EngineConfig) -> Result<SkillOutline, ProtocolDefect> {
    let clear_on_finish = skill.clear_context_on_finish() && !config.retain_context;
    let mut outline = SkillOutline::new(clear_on_finish);
    for spec in skill.required() {
        outline = outline.with_required(spec.name.clone(), spec.message_to_confirm.clone());
    }
    for spec in skill.optional() {
        outline = outline.with_optional(spec.name.clone(), spec.message_to_confirm.clone());
    }
    if let Some(name) = outline.duplicate_name() {
        return Err(ProtocolDefect::DuplicateParameter(name.to_string()));
    }
    Ok(outline)
}

// ============================================================================
// Finish-time delivery
// ============================================================================

/// Delivery handle given to `Skill::finish`.
///
/// Every delivery is keyed by its target and its position among deliveries to
/// that target (`reply#0`, `deliver_to:U1#0`). Keys already marked sent by an
/// earlier attempt are skipped, so re-running `finish` after a partial failure
/// only repeats what did not go out.
pub struct Delivery<'a> {
    conversation_id: &'a str,
    queued: Mutex<Vec<Message>>,
    messenger: &'a dyn Messenger,
    ledger: Mutex<Ledger>,
}

#[derive(Default)]
struct Ledger {
    sent: BTreeSet<String>,
    issued: BTreeMap<String, usize>,
}

impl<'a> Delivery<'a> {
    pub fn new(
        conversation_id: &'a str,
        queued: Vec<Message>,
        sent: BTreeSet<String>,
        messenger: &'a dyn Messenger,
    ) -> Self {
        Self {
            conversation_id,
            queued: Mutex::new(queued),
            messenger,
            ledger: Mutex::new(Ledger {
                sent,
                issued: BTreeMap::new(),
            }),
        }
    }

    /// Reply to the current user now; messages queued earlier go first
    pub async fn reply(&self, message: Message) -> Result<(), SkillError> {
        let mut messages =
            std::mem::take(&mut *self.queued.lock().unwrap_or_else(PoisonError::into_inner));
        let Some(key) = self.claim("reply") else {
            return Ok(());
        };
        messages.push(message);
        self.messenger
            .reply(self.conversation_id, &messages)
            .await
            .map_err(SkillError::Delivery)?;
        self.mark_sent(key);
        Ok(())
    }

    /// Deliver to another party of the conversation
    pub async fn deliver_to(&self, user_id: &str, message: Message, locale: &str) -> Result<(), SkillError> {
        let Some(key) = self.claim(&format!("deliver_to:{user_id}")) else {
            return Ok(());
        };
        self.messenger
            .deliver_to(user_id, &[message], locale)
            .await
            .map_err(SkillError::Delivery)?;
        self.mark_sent(key);
        Ok(())
    }

    /// Keys of every delivery that has gone out, this attempt or earlier
    pub fn into_sent(self) -> BTreeSet<String> {
        self.ledger
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
    }

    /// Next key for `target`, or `None` when that delivery already went out
    fn claim(&self, target: &str) -> Option<String> {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let position = ledger.issued.entry(target.to_string()).or_insert(0);
        let key = format!("{target}#{position}");
        *position += 1;
        if ledger.sent.contains(&key) {
            tracing::debug!(conv_id = %self.conversation_id, key = %key, "Skipping delivery sent on an earlier attempt");
            return None;
        }
        Some(key)
    }

    fn mark_sent(&self, key: String) {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .insert(key);
    }
}
