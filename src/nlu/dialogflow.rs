//! Dialogflow (v2 REST) backend implementation

use super::{Intent, NewIntent, NluBackend, NluError};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Connection settings for the Dialogflow agent
#[derive(Debug, Clone)]
pub struct DialogflowConfig {
    pub base_url: String,
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    /// Minimum intent detection confidence for a classification to count
    pub min_confidence: f64,
    pub timeout: Duration,
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dialogflow.googleapis.com/v2".to_string(),
            project_id: None,
            access_token: None,
            min_confidence: 0.5,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Dialogflow agent client
pub struct DialogflowClient {
    client: Client,
    agent_url: String,
    access_token: String,
    min_confidence: f64,
}

impl DialogflowClient {
    pub fn new(config: &DialogflowConfig) -> Result<Self, NluError> {
        let project_id = config
            .project_id
            .as_deref()
            .ok_or_else(|| NluError::not_configured("DIALOGFLOW_PROJECT_ID is not set"))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| NluError::not_configured("DIALOGFLOW_TOKEN is not set"))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NluError::not_configured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            agent_url: format!(
                "{}/projects/{project_id}/agent",
                config.base_url.trim_end_matches('/')
            ),
            access_token,
            min_confidence: config.min_confidence,
        })
    }

    async fn call<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<String, NluError> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NluError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                NluError::network(format!("Connection failed: {e}"))
            } else {
                NluError::network(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NluError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Ok(body)
    }

    async fn get_full_intent(&self, intent_id: &str) -> Result<Value, NluError> {
        let url = format!("{}/intents/{intent_id}", self.agent_url);
        let body = self
            .call::<Value>(Method::GET, &url, &[("intentView", "INTENT_VIEW_FULL")], None)
            .await?;
        parse_body(&body)
    }
}

#[async_trait]
impl NluBackend for DialogflowClient {
    async fn classify(
        &self,
        locale: &str,
        domain: &str,
        text: &str,
        labels: &[String],
    ) -> Result<Option<String>, NluError> {
        let session = uuid::Uuid::new_v4();
        let url = format!("{}/sessions/{session}:detectIntent", self.agent_url);
        let request = json!({
            "queryInput": {
                "text": { "text": text, "languageCode": locale }
            }
        });

        let body = self.call(Method::POST, &url, &[], Some(&request)).await?;
        let response: DetectIntentResponse = parse_body(&body)?;
        Ok(match_label(&response.query_result, domain, labels, self.min_confidence))
    }

    async fn list_intents(&self) -> Result<Vec<Intent>, NluError> {
        let url = format!("{}/intents", self.agent_url);
        let mut intents = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut query = vec![("pageSize", "1000")];
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.as_str()));
            }
            let body = self.call::<Value>(Method::GET, &url, &query, None).await?;
            let page: ListIntentsResponse = parse_body(&body)?;

            intents.extend(page.intents.into_iter().map(IntentResource::into_intent));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => break,
            }
        }

        Ok(intents)
    }

    async fn add_intent(&self, intent: &NewIntent) -> Result<Intent, NluError> {
        let url = format!("{}/intents", self.agent_url);
        let body = self
            .call(Method::POST, &url, &[], Some(&new_intent_body(intent)))
            .await?;
        let created: IntentResource = parse_body(&body)?;
        Ok(created.into_intent())
    }

    async fn add_sentence(&self, intent_id: &str, training_phrase: &str) -> Result<(), NluError> {
        let mut intent = self.get_full_intent(intent_id).await?;
        append_training_phrase(&mut intent, training_phrase)?;

        let url = format!("{}/intents/{intent_id}", self.agent_url);
        self.call(
            Method::PATCH,
            &url,
            &[("updateMask", "trainingPhrases")],
            Some(&intent),
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// Request / response translation
// ============================================================================

fn classify_error(status: StatusCode, body: &str) -> NluError {
    match status.as_u16() {
        401 | 403 => NluError::auth(format!("Authentication failed: {body}")),
        404 => NluError::not_found(format!("Not found: {body}")),
        500..=599 => NluError::server_error(format!("Server error: {body}")),
        _ => NluError::invalid_response(format!("HTTP {status}: {body}")),
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, NluError> {
    serde_json::from_str(body)
        .map_err(|e| NluError::invalid_response(format!("Failed to parse response: {e} - body: {body}")))
}

/// Pick the label the agent matched, if it is confident and within the set
fn match_label(
    result: &QueryResult,
    domain: &str,
    labels: &[String],
    min_confidence: f64,
) -> Option<String> {
    if result.action.as_deref() != Some(domain) {
        return None;
    }
    if result.intent_detection_confidence.unwrap_or(0.0) < min_confidence {
        return None;
    }
    let candidate = result.parameters.get(domain)?.as_str()?;
    labels.iter().find(|label| label.as_str() == candidate).cloned()
}

fn new_intent_body(intent: &NewIntent) -> Value {
    json!({
        "displayName": intent.name,
        "action": intent.action,
        "trainingPhrases": [training_phrase(&intent.training_phrase)],
        "messages": [
            { "text": { "text": [intent.response] } }
        ]
    })
}

fn training_phrase(text: &str) -> Value {
    json!({ "type": "EXAMPLE", "parts": [{ "text": text }] })
}

fn append_training_phrase(intent: &mut Value, text: &str) -> Result<(), NluError> {
    let object = intent
        .as_object_mut()
        .ok_or_else(|| NluError::invalid_response("Intent body is not an object"))?;
    let phrases = object
        .entry("trainingPhrases")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(phrases) = phrases.as_array_mut() else {
        return Err(NluError::invalid_response("trainingPhrases is not an array"));
    };
    phrases.push(training_phrase(text));
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: QueryResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    action: Option<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
    intent_detection_confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListIntentsResponse {
    #[serde(default)]
    intents: Vec<IntentResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentResource {
    /// `projects/<project>/agent/intents/<id>`
    name: String,
    display_name: String,
}

impl IntentResource {
    fn into_intent(self) -> Intent {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or(self.name.as_str())
            .to_string();
        Intent::new(id, self.display_name)
    }
}
