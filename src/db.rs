//! Database module for conversation contexts
//!
//! Each context is stored as one JSON document keyed by conversation id,
//! with its state label and timestamps broken out for listing and reaping.

mod schema;

pub use schema::ContextSummary;
use schema::SCHEMA;

use crate::state_machine::Conversation;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt context for {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not encode context: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Context Operations ====================

    pub fn load_conversation(&self, id: &str) -> DbResult<Option<Conversation>> {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| {
            serde_json::from_str(&body).map_err(|source| DbError::Corrupt {
                id: id.to_string(),
                source,
            })
        })
        .transpose()
    }

    /// Insert or replace a context
    pub fn save_conversation(&self, conversation: &Conversation) -> DbResult<()> {
        let body = serde_json::to_string(conversation)?;
        let now = timestamp(Utc::now());
        self.conn().execute(
            "INSERT INTO conversations (id, state_type, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                state_type = excluded.state_type,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![
                conversation.id,
                conversation.state.label(),
                body,
                now,
                timestamp(conversation.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Returns whether a context was removed
    pub fn delete_conversation(&self, id: &str) -> DbResult<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Contexts currently in `state_type` (a state label such as `stalled`),
    /// least recently updated first
    pub fn list_by_state(&self, state_type: &str) -> DbResult<Vec<ContextSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, state_type, updated_at FROM conversations
             WHERE state_type = ?1 ORDER BY updated_at ASC",
        )?;
        let rows = stmt.query_map(params![state_type], |row| {
            Ok(ContextSummary {
                id: row.get(0)?,
                state_type: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        let summaries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Delete contexts untouched since `cutoff`; returns how many went
    pub fn reap_before(&self, cutoff: DateTime<Utc>) -> DbResult<usize> {
        let reaped = self.conn().execute(
            "DELETE FROM conversations WHERE updated_at < ?1",
            params![timestamp(cutoff)],
        )?;
        if reaped > 0 {
            tracing::info!(reaped, cutoff = %cutoff, "Reaped abandoned conversations");
        }
        Ok(reaped)
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
