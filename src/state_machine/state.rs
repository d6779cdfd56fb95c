//! Conversation state types

use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

// ============================================================================
// Parse outcome
// ============================================================================

/// Result of running a parameter's parser over raw user input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Parsed {
    /// Input accepted; carries the normalized value
    Accepted { value: Value },
    /// Input did not match any accepted label or shape
    Rejected { reason: String },
}

impl Parsed {
    pub fn accepted(value: impl Into<Value>) -> Self {
        Parsed::Accepted {
            value: value.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Parsed::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Parsed::Rejected { .. })
    }

    /// Accepted value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            Parsed::Accepted { value } => Some(value),
            Parsed::Rejected { .. } => None,
        }
    }
}

// ============================================================================
// Conversation phase
// ============================================================================

/// Step that failed and can be re-run with `Event::Retry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StalledStep {
    Reaction { parameter: String, outcome: Parsed },
    /// `sent` keys the deliveries that already went out
    Finish {
        #[serde(default)]
        sent: BTreeSet<String>,
    },
}

/// Phase of a conversation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Created, nothing asked yet
    #[default]
    Idle,

    /// Waiting for the user to answer `parameter`
    AwaitingInput { parameter: String },

    /// Parser running over the user's answer
    Validating { parameter: String },

    /// Reaction running after the parser produced `outcome`
    Reacting { parameter: String, outcome: Parsed },

    /// Every required parameter confirmed, finish routine running
    Finishing,

    /// A reaction or the finish routine failed; confirmed answers are kept
    Stalled { step: StalledStep, message: String },

    /// Finish completed and the context was retained
    Finished,
}

impl ConvState {
    /// Short label for logs and storage
    pub fn label(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::AwaitingInput { .. } => "awaiting_input",
            ConvState::Validating { .. } => "validating",
            ConvState::Reacting { .. } => "reacting",
            ConvState::Finishing => "finishing",
            ConvState::Stalled { .. } => "stalled",
            ConvState::Finished => "finished",
        }
    }

    /// A turn is mid-flight (parser, reaction or finish running)
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ConvState::Validating { .. } | ConvState::Reacting { .. } | ConvState::Finishing
        )
    }
}

// ============================================================================
// Pending queue
// ============================================================================

/// FIFO of parameter names still to ask, without duplicates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue(VecDeque<String>);

impl PendingQueue {
    /// Append `name` unless already queued. Returns whether it was added.
    pub fn push(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push_back(name);
        true
    }

    pub fn front(&self) -> Option<&str> {
        self.0.front().map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|n| n != name);
        before != self.0.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

// ============================================================================
// Conversation
// ============================================================================

/// Per-conversation state consumed and mutated by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub sender_language: String,
    pub state: ConvState,
    /// Accepted, normalized values by parameter name
    pub confirmed: BTreeMap<String, Value>,
    pub pending: PendingQueue,
    /// Prompts replaced at runtime by reactions
    pub prompt_overrides: BTreeMap<String, Message>,
    /// Data handed from one step to a later one
    pub scratch: BTreeMap<String, Value>,
    /// Messages queued by reactions, flushed with the next reply
    pub outbox: Vec<Message>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, sender_language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender_language: sender_language.into(),
            state: ConvState::Idle,
            confirmed: BTreeMap::new(),
            pending: PendingQueue::default(),
            prompt_overrides: BTreeMap::new(),
            scratch: BTreeMap::new(),
            outbox: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Fresh conversation with the same identity
    pub fn reset(&self) -> Self {
        Self::new(self.id.clone(), self.sender_language.clone())
    }

    /// New exchange on a retained context. Values carry over only for
    /// parameters `outline` declares without a prompt; anything the user is
    /// asked for is asked again. Scratch is kept.
    pub fn chain(&self, outline: &SkillOutline) -> Self {
        let mut next = self.reset();
        next.confirmed = self
            .confirmed
            .iter()
            .filter(|(name, _)| outline.declares(name) && outline.declared_prompt(name).is_none())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        next.scratch = self.scratch.clone();
        next
    }

    pub fn confirmed_str(&self, name: &str) -> Option<&str> {
        self.confirmed.get(name).and_then(Value::as_str)
    }

    pub fn is_confirmed(&self, name: &str) -> bool {
        self.confirmed.contains_key(name)
    }

    /// Prompt to show for `parameter`: runtime override first, then declared
    pub fn prompt_for<'a>(&'a self, parameter: &str, outline: &'a SkillOutline) -> Option<&'a Message> {
        self.prompt_overrides
            .get(parameter)
            .or_else(|| outline.declared_prompt(parameter))
    }
}

// ============================================================================
// Skill outline
// ============================================================================

/// The shape of a skill as seen by the transition function: parameter names,
/// declared prompts and the finish-time context decision. Carries no I/O.
#[derive(Debug, Clone, Default)]
pub struct SkillOutline {
    required: Vec<String>,
    optional: Vec<String>,
    prompts: HashMap<String, Message>,
    clear_on_finish: bool,
}

impl SkillOutline {
    pub fn new(clear_on_finish: bool) -> Self {
        Self {
            clear_on_finish,
            ..Self::default()
        }
    }

    pub fn with_required(mut self, name: impl Into<String>, prompt: Option<Message>) -> Self {
        let name = name.into();
        if let Some(prompt) = prompt {
            self.prompts.insert(name.clone(), prompt);
        }
        self.required.push(name);
        self
    }

    pub fn with_optional(mut self, name: impl Into<String>, prompt: Option<Message>) -> Self {
        let name = name.into();
        if let Some(prompt) = prompt {
            self.prompts.insert(name.clone(), prompt);
        }
        self.optional.push(name);
        self
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    pub fn optional(&self) -> impl Iterator<Item = &str> {
        self.optional.iter().map(String::as_str)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.required.iter().chain(&self.optional).any(|n| n == name)
    }

    pub fn declared_prompt(&self, name: &str) -> Option<&Message> {
        self.prompts.get(name)
    }

    pub fn clear_on_finish(&self) -> bool {
        self.clear_on_finish
    }

    /// First name declared more than once, if any
    pub fn duplicate_name(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.required
            .iter()
            .chain(&self.optional)
            .find(|name| !seen.insert(name.as_str()))
            .map(String::as_str)
    }
}
