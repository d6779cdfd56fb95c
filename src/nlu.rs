//! NLU backend abstraction
//!
//! The backend classifies free text against a closed label set and manages
//! the trainable intent catalog.

mod dialogflow;
mod error;
mod types;

pub use dialogflow::{DialogflowClient, DialogflowConfig};
pub use error::{NluError, NluErrorKind};
pub use types::{Intent, NewIntent};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for NLU backends
#[async_trait]
pub trait NluBackend: Send + Sync {
    /// Classify `text` within `domain`; returns the matched label when the
    /// backend is confident it is one of `labels`
    async fn classify(
        &self,
        locale: &str,
        domain: &str,
        text: &str,
        labels: &[String],
    ) -> Result<Option<String>, NluError>;

    /// Full intent catalog in backend order
    async fn list_intents(&self) -> Result<Vec<Intent>, NluError>;

    /// Create a new intent
    async fn add_intent(&self, intent: &NewIntent) -> Result<Intent, NluError>;

    /// Add a training phrase to an existing intent
    async fn add_sentence(&self, intent_id: &str, training_phrase: &str) -> Result<(), NluError>;
}

#[async_trait]
impl<T: NluBackend + ?Sized> NluBackend for Arc<T> {
    async fn classify(
        &self,
        locale: &str,
        domain: &str,
        text: &str,
        labels: &[String],
    ) -> Result<Option<String>, NluError> {
        (**self).classify(locale, domain, text, labels).await
    }

    async fn list_intents(&self) -> Result<Vec<Intent>, NluError> {
        (**self).list_intents().await
    }

    async fn add_intent(&self, intent: &NewIntent) -> Result<Intent, NluError> {
        (**self).add_intent(intent).await
    }

    async fn add_sentence(&self, intent_id: &str, training_phrase: &str) -> Result<(), NluError> {
        (**self).add_sentence(intent_id, training_phrase).await
    }
}

/// Logging wrapper for NLU backends
pub struct LoggingBackend {
    inner: Arc<dyn NluBackend>,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn NluBackend>) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(operation: &str, started: Instant, result: &Result<T, NluError>) {
    let duration_ms = started.elapsed().as_millis();
    match result {
        Ok(_) => tracing::debug!(operation, duration_ms = %duration_ms, "NLU call completed"),
        Err(e) => tracing::error!(
            operation,
            duration_ms = %duration_ms,
            error = %e.message,
            transient = e.kind.is_transient(),
            "NLU call failed"
        ),
    }
}

#[async_trait]
impl NluBackend for LoggingBackend {
    async fn classify(
        &self,
        locale: &str,
        domain: &str,
        text: &str,
        labels: &[String],
    ) -> Result<Option<String>, NluError> {
        let started = Instant::now();
        let result = self.inner.classify(locale, domain, text, labels).await;
        log_outcome("classify", started, &result);
        if let Ok(label) = &result {
            tracing::info!(domain, locale, matched = ?label, "Classified free-text answer");
        }
        result
    }

    async fn list_intents(&self) -> Result<Vec<Intent>, NluError> {
        let started = Instant::now();
        let result = self.inner.list_intents().await;
        log_outcome("list_intents", started, &result);
        result
    }

    async fn add_intent(&self, intent: &NewIntent) -> Result<Intent, NluError> {
        let started = Instant::now();
        let result = self.inner.add_intent(intent).await;
        log_outcome("add_intent", started, &result);
        if let Ok(created) = &result {
            tracing::info!(intent_id = %created.id, name = %created.name, "Created intent");
        }
        result
    }

    async fn add_sentence(&self, intent_id: &str, training_phrase: &str) -> Result<(), NluError> {
        let started = Instant::now();
        let result = self.inner.add_sentence(intent_id, training_phrase).await;
        log_outcome("add_sentence", started, &result);
        result
    }
}
