//! Common types for NLU backend interactions

use serde::{Deserialize, Serialize};

/// Intent as listed in the backend's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    pub name: String,
}

impl Intent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Intent to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntent {
    pub name: String,
    pub training_phrase: String,
    /// Action tag reported when the intent matches
    pub action: String,
    /// Text the bot answers with
    pub response: String,
}
