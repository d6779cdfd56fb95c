//! Numbered intent menu for picking where a learned sentence goes

use super::Turn;
use crate::message::Message;
use crate::nlu::{Intent, NluBackend, NluError};

/// System and reserved intents never offered in the menu
pub const SKIP_INTENTS: &[&str] = &[
    "Default Fallback Intent",
    "Default Welcome Intent",
    "escalation",
    "human-response",
    "robot-response",
];

/// Scratch key holding the filtered catalog the menu was rendered from
pub const CATALOG_KEY: &str = "intent_list";

/// Parameter the menu answer is collected into
pub const SELECTION_PARAMETER: &str = "intent_id";

/// Drop intents whose name exactly matches an exclusion, keeping order
pub fn filter_catalog(catalog: Vec<Intent>, exclusions: &[&str]) -> Vec<Intent> {
    catalog
        .into_iter()
        .filter(|intent| !exclusions.contains(&intent.name.as_str()))
        .collect()
}

/// 1-based list of intent names followed by the "new question" entry
pub fn render_menu(intents: &[Intent]) -> Message {
    let mut text = String::from("Please tell me the number of the question to add this sentence.\n");
    for (i, intent) in intents.iter().enumerate() {
        text.push_str(&format!("{} {}\n", i + 1, intent.name));
    }
    text.push_str(&format!("{} New question", intents.len() + 1));
    Message::text(text)
}

/// Fetch the catalog, cache the filtered list, and collect the numeric
/// selection with the rendered menu as its prompt
pub async fn build_selection_menu(
    nlu: &dyn NluBackend,
    exclusions: &[&str],
    turn: &mut Turn,
) -> Result<(), NluError> {
    let intents = filter_catalog(nlu.list_intents().await?, exclusions);
    tracing::debug!(count = intents.len(), "Built intent selection menu");

    let cached = serde_json::to_value(&intents)
        .map_err(|e| NluError::invalid_response(format!("Unserializable intent catalog: {e}")))?;
    turn.remember(CATALOG_KEY, cached);
    turn.override_prompt(SELECTION_PARAMETER, render_menu(&intents));
    turn.collect(SELECTION_PARAMETER);
    Ok(())
}
