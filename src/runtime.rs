//! Runtime for executing conversations
//!
//! Each conversation gets its own task fed through a channel, so exactly one
//! turn is in flight per conversation while different conversations progress
//! concurrently. The store stays the source of truth: every turn starts from
//! the stored context, and a task is retired once its conversation finishes.

mod executor;
mod recovery;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{Engine, Progress, TurnError};
pub use recovery::{recover, RecoveryDecision, RecoveryReason};
pub use traits::*;

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

type Reply = oneshot::Sender<Result<Progress, TurnError>>;

/// Work queued for a conversation task
#[derive(Debug)]
enum Command {
    Start {
        supplied: BTreeMap<String, Value>,
        reply: Reply,
    },
    Advance {
        input: Option<String>,
        reply: Reply,
    },
    Retry {
        reply: Reply,
    },
}

/// Routes host events to per-conversation tasks
pub struct SessionManager<M, S>
where
    M: Messenger + 'static,
    S: ContextStore + 'static,
{
    engine: Arc<Engine<M, S>>,
    default_language: String,
    sessions: RwLock<HashMap<String, mpsc::Sender<Command>>>,
}

impl<M, S> SessionManager<M, S>
where
    M: Messenger + 'static,
    S: ContextStore + 'static,
{
    pub fn new(engine: Arc<Engine<M, S>>, default_language: impl Into<String>) -> Self {
        Self {
            engine,
            default_language: default_language.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn start(
        &self,
        conversation_id: &str,
        supplied: BTreeMap<String, Value>,
    ) -> Result<Progress, TurnError> {
        self.submit(conversation_id, |reply| Command::Start { supplied, reply })
            .await
    }

    /// Deliver one user message; `None` re-sends the outstanding prompt
    pub async fn advance(&self, conversation_id: &str, input: Option<String>) -> Result<Progress, TurnError> {
        self.submit(conversation_id, |reply| Command::Advance { input, reply })
            .await
    }

    pub async fn retry(&self, conversation_id: &str) -> Result<Progress, TurnError> {
        self.submit(conversation_id, |reply| Command::Retry { reply })
            .await
    }

    /// Number of conversations with a running task
    #[cfg(test)]
    pub async fn active(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn submit(
        &self,
        conversation_id: &str,
        command: impl FnOnce(Reply) -> Command,
    ) -> Result<Progress, TurnError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let tx = self.get_or_spawn(conversation_id).await;

        if tx.send(command(reply_tx)).await.is_err() {
            self.sessions.write().await.remove(conversation_id);
            return Err(TurnError::SessionClosed(conversation_id.to_string()));
        }

        let result = reply_rx
            .await
            .map_err(|_| TurnError::SessionClosed(conversation_id.to_string()))?;

        if matches!(result, Ok(Progress::Finished { .. })) {
            self.retire(conversation_id, &tx).await;
        }
        result
    }

    /// Drop the route to a finished conversation's task. The task drains
    /// whatever is already queued and stops once the last sender is gone.
    async fn retire(&self, conversation_id: &str, tx: &mpsc::Sender<Command>) {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(conversation_id)
            .is_some_and(|current| current.same_channel(tx))
        {
            sessions.remove(conversation_id);
            tracing::debug!(conv_id = %conversation_id, "Retired finished conversation session");
        }
    }

    async fn get_or_spawn(&self, conversation_id: &str) -> mpsc::Sender<Command> {
        {
            let sessions = self.sessions.read().await;
            if let Some(tx) = sessions.get(conversation_id) {
                if !tx.is_closed() {
                    return tx.clone();
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another caller may have spawned it while we waited for the lock
        if let Some(tx) = sessions.get(conversation_id) {
            if !tx.is_closed() {
                return tx.clone();
            }
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run_session(
            Arc::clone(&self.engine),
            conversation_id.to_string(),
            self.default_language.clone(),
            rx,
        ));
        sessions.insert(conversation_id.to_string(), tx.clone());
        tx
    }
}

/// Serve commands for one conversation until every sender is gone.
/// Each command works on a fresh load, so a context reaped or rewritten in
/// the store between turns is never written back from a stale copy.
async fn run_session<M, S>(
    engine: Arc<Engine<M, S>>,
    conversation_id: String,
    language: String,
    mut rx: mpsc::Receiver<Command>,
) where
    M: Messenger + 'static,
    S: ContextStore + 'static,
{
    tracing::info!(conv_id = %conversation_id, "Starting conversation session");

    while let Some(command) = rx.recv().await {
        let mut conversation = match engine.load(&conversation_id, &language).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(conv_id = %conversation_id, error = %e, "Failed to load context");
                let _ = command.into_reply().send(Err(e));
                continue;
            }
        };

        let (result, reply) = match command {
            Command::Start { supplied, reply } => (engine.start(&mut conversation, supplied).await, reply),
            Command::Advance { input, reply } => (engine.advance(&mut conversation, input).await, reply),
            Command::Retry { reply } => (engine.retry(&mut conversation).await, reply),
        };

        if let Err(e) = &result {
            tracing::warn!(conv_id = %conversation_id, error = %e, "Turn did not complete");
        }
        if reply.send(result).is_err() {
            tracing::debug!(conv_id = %conversation_id, "Caller went away before the turn completed");
        }
    }

    tracing::info!(conv_id = %conversation_id, "Conversation session stopped");
}

impl Command {
    fn into_reply(self) -> Reply {
        match self {
            Command::Start { reply, .. } | Command::Advance { reply, .. } | Command::Retry { reply } => reply,
        }
    }
}
