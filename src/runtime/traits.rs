//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the engine with mock implementations.

use crate::db::Database;
use crate::message::Message;
use crate::state_machine::Conversation;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound message transport
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send messages to the user of `conversation_id`, in order
    async fn reply(&self, conversation_id: &str, messages: &[Message]) -> Result<(), String>;

    /// Out-of-band delivery to another party
    async fn deliver_to(&self, user_id: &str, messages: &[Message], locale: &str) -> Result<(), String>;
}

/// Storage for conversation contexts
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn load(&self, conversation_id: &str) -> Result<Option<Conversation>, String>;

    /// Insert or replace the stored context
    async fn save(&self, conversation: &Conversation) -> Result<(), String>;

    /// Forget the context; no-op when absent
    async fn clear(&self, conversation_id: &str) -> Result<(), String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    async fn reply(&self, conversation_id: &str, messages: &[Message]) -> Result<(), String> {
        (**self).reply(conversation_id, messages).await
    }

    async fn deliver_to(&self, user_id: &str, messages: &[Message], locale: &str) -> Result<(), String> {
        (**self).deliver_to(user_id, messages, locale).await
    }
}

#[async_trait]
impl<T: ContextStore + ?Sized> ContextStore for Arc<T> {
    async fn load(&self, conversation_id: &str) -> Result<Option<Conversation>, String> {
        (**self).load(conversation_id).await
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        (**self).save(conversation).await
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), String> {
        (**self).clear(conversation_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl ContextStore for Database {
    async fn load(&self, conversation_id: &str) -> Result<Option<Conversation>, String> {
        self.load_conversation(conversation_id).map_err(|e| e.to_string())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        self.save_conversation(conversation).map_err(|e| e.to_string())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), String> {
        self.delete_conversation(conversation_id)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
