//! Process configuration
//!
//! Everything environment-derived is read once here and handed to the engine
//! and adapters as plain values.

use crate::nlu::DialogflowConfig;
use std::time::Duration;

/// Engine behaviour toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Keep conversation state after finish even when the skill asks to
    /// clear it (test mode)
    pub retain_context: bool,
}

/// Which learning branch the human-response skill offers after
/// `enable_learning` is confirmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LearningMode {
    /// Ask whether the question is new; route to a new intent or add it as a
    /// sentence to an intent picked from the catalog
    #[default]
    IntentAndSentence,
    /// Always create a new intent
    IntentOnly,
}

impl LearningMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "intent_and_sentence" | "full" => Some(Self::IntentAndSentence),
            "intent_only" => Some(Self::IntentOnly),
            _ => None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub learning_mode: LearningMode,
    pub dialogflow: DialogflowConfig,
    /// SQLite file holding conversation contexts
    pub db_path: String,
    /// Language assumed for the administrator side of the conversation
    pub default_language: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = DialogflowConfig::default();

        let learning_mode = match lookup("PARLEY_LEARNING_MODE") {
            Some(raw) => LearningMode::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown PARLEY_LEARNING_MODE, using default");
                LearningMode::default()
            }),
            None => LearningMode::default(),
        };

        let db_path = lookup("PARLEY_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.parley/parley.db")
        });

        Self {
            engine: EngineConfig {
                retain_context: lookup("PARLEY_ENV").is_some_and(|env| env == "test"),
            },
            learning_mode,
            dialogflow: DialogflowConfig {
                base_url: lookup("DIALOGFLOW_BASE_URL").unwrap_or(defaults.base_url),
                project_id: lookup("DIALOGFLOW_PROJECT_ID"),
                access_token: lookup("DIALOGFLOW_TOKEN"),
                min_confidence: lookup("PARLEY_NLU_MIN_CONFIDENCE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.min_confidence),
                timeout: lookup("PARLEY_NLU_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .map_or(defaults.timeout, Duration::from_secs),
            },
            db_path,
            default_language: lookup("PARLEY_LANGUAGE").unwrap_or_else(|| "en".to_string()),
        }
    }
}
