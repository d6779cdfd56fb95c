//! Database schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    state_type TEXT NOT NULL DEFAULT 'idle',
    body TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_state ON conversations(state_type);
CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at);
";

/// Summary row for listing contexts without decoding their bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    pub id: String,
    pub state_type: String,
    pub updated_at: String,
}
