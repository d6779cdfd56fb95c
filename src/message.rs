//! Message payloads exchanged with the user
//!
//! Shapes follow the messaging-platform convention of a `type` tag with
//! either plain text or a template carrying selectable actions.

use serde::{Deserialize, Serialize};

/// Structured outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Text {
        text: String,
    },
    Template {
        #[serde(rename = "altText")]
        alt_text: String,
        template: Template,
    },
}

/// Template body with selectable actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Template {
    /// Two-choice confirmation (e.g. Yes / No)
    Confirm { text: String, actions: Vec<Action> },
    /// Up to a handful of buttons
    Buttons { text: String, actions: Vec<Action> },
}

/// Action attached to a template; selecting it sends `text` back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Message { label: String, text: String },
}

impl Action {
    /// Action whose label is also the text sent back
    pub fn echo(label: impl Into<String>) -> Self {
        let label = label.into();
        Action::Message {
            text: label.clone(),
            label,
        }
    }
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text { text: text.into() }
    }

    pub fn confirm(text: impl Into<String>, labels: &[&str]) -> Self {
        let text = text.into();
        Message::Template {
            alt_text: text.clone(),
            template: Template::Confirm {
                text,
                actions: labels.iter().map(|l| Action::echo(*l)).collect(),
            },
        }
    }

    pub fn buttons(text: impl Into<String>, labels: &[&str]) -> Self {
        let text = text.into();
        Message::Template {
            alt_text: text.clone(),
            template: Template::Buttons {
                text,
                actions: labels.iter().map(|l| Action::echo(*l)).collect(),
            },
        }
    }

    /// Human-readable rendering, used by text-only transports and logs
    pub fn plain_text(&self) -> String {
        match self {
            Message::Text { text } => text.clone(),
            Message::Template { template, .. } => {
                let (text, actions) = match template {
                    Template::Confirm { text, actions } | Template::Buttons { text, actions } => {
                        (text, actions)
                    }
                };
                let labels: Vec<&str> = actions
                    .iter()
                    .map(|Action::Message { label, .. }| label.as_str())
                    .collect();
                format!("{text} [{}]", labels.join(" / "))
            }
        }
    }
}
