//! Reusable parameter parsers

use super::{Parser, SkillError};
use crate::nlu::NluBackend;
use crate::state_machine::{Conversation, Parsed};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Accepts any answer as a string
pub struct AcceptAny;

#[async_trait]
impl Parser for AcceptAny {
    async fn parse(&self, value: &str, _: &Conversation) -> Result<Parsed, SkillError> {
        Ok(Parsed::accepted(value))
    }
}

/// Accepts one of a closed set of labels. Exact (case-insensitive) answers
/// match directly; anything else is classified by the NLU backend so users
/// can answer naturally ("nah" for "No").
pub struct NluChoice {
    nlu: Arc<dyn NluBackend>,
    domain: String,
    labels: Vec<String>,
}

impl NluChoice {
    pub fn new(nlu: Arc<dyn NluBackend>, domain: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            nlu,
            domain: domain.into(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    fn exact_match(&self, value: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.eq_ignore_ascii_case(value))
            .map(String::as_str)
    }
}

#[async_trait]
impl Parser for NluChoice {
    async fn parse(&self, value: &str, conversation: &Conversation) -> Result<Parsed, SkillError> {
        let value = value.trim();
        if let Some(label) = self.exact_match(value) {
            return Ok(Parsed::accepted(label));
        }
        if value.is_empty() {
            return Ok(Parsed::rejected("empty answer"));
        }

        let classified = self
            .nlu
            .classify(&conversation.sender_language, &self.domain, value, &self.labels)
            .await?;

        Ok(match classified {
            Some(label) if self.labels.contains(&label) => Parsed::accepted(label),
            _ => Parsed::rejected(format!("`{value}` is not one of {}", self.labels.join(", "))),
        })
    }
}

/// Picks an entry of a catalog cached in conversation scratch by its 1-based
/// number. The number one past the end selects "create new" and yields a
/// `null` value.
pub struct NumericSelection {
    catalog_key: String,
}

impl NumericSelection {
    pub fn new(catalog_key: impl Into<String>) -> Self {
        Self {
            catalog_key: catalog_key.into(),
        }
    }
}

/// Positive whole number in `raw`, tolerating whitespace and `2.0`
fn positive_integer(raw: &str) -> Option<usize> {
    let number: f64 = raw.trim().parse().ok()?;
    if !number.is_finite() || number.fract() != 0.0 || number < 1.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(number as usize)
}

#[async_trait]
impl Parser for NumericSelection {
    async fn parse(&self, value: &str, conversation: &Conversation) -> Result<Parsed, SkillError> {
        let catalog = conversation
            .scratch
            .get(&self.catalog_key)
            .and_then(Value::as_array)
            .ok_or_else(|| SkillError::MissingScratch(self.catalog_key.clone()))?;

        let Some(k) = positive_integer(value) else {
            return Ok(Parsed::rejected(format!("`{}` is not a positive number", value.trim())));
        };

        if k <= catalog.len() {
            let id = catalog[k - 1]
                .get("id")
                .cloned()
                .ok_or_else(|| SkillError::MissingScratch(format!("{}[{}].id", self.catalog_key, k - 1)))?;
            return Ok(Parsed::accepted(id));
        }
        if k == catalog.len() + 1 {
            return Ok(Parsed::accepted(Value::Null));
        }
        Ok(Parsed::rejected(format!("{k} is out of range 1..={}", catalog.len() + 1)))
    }
}
