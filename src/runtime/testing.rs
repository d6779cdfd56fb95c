//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::executor::{Engine, Progress, TurnError};
use super::traits::{ContextStore, Messenger};
use crate::config::{EngineConfig, LearningMode};
use crate::message::Message;
use crate::nlu::{Intent, NewIntent, NluBackend, NluError};
use crate::skill::HumanResponseSkill;
use crate::state_machine::Conversation;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock NLU backend
// ============================================================================

/// NLU backend answering from canned classifications and a fixed catalog
#[derive(Default)]
pub struct MockNlu {
    classifications: HashMap<String, String>,
    catalog: Vec<Intent>,
    failing: AtomicBool,
    classify_calls: Mutex<Vec<(String, String, String)>>,
    list_calls: Mutex<usize>,
    added_intents: Mutex<Vec<NewIntent>>,
    added_sentences: Mutex<Vec<(String, String)>>,
}

impl MockNlu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `text` as `label`
    pub fn with_classification(mut self, text: impl Into<String>, label: impl Into<String>) -> Self {
        self.classifications.insert(text.into(), label.into());
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<Intent>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Every call fails with a network error
    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), NluError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(NluError::network("mock backend unreachable"))
        } else {
            Ok(())
        }
    }

    /// (locale, domain, text) of every classify call
    pub fn classify_calls(&self) -> Vec<(String, String, String)> {
        self.classify_calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    pub fn added_intents(&self) -> Vec<NewIntent> {
        self.added_intents.lock().unwrap().clone()
    }

    /// (intent id, training phrase) of every added sentence
    pub fn added_sentences(&self) -> Vec<(String, String)> {
        self.added_sentences.lock().unwrap().clone()
    }
}

#[async_trait]
impl NluBackend for MockNlu {
    async fn classify(
        &self,
        locale: &str,
        domain: &str,
        text: &str,
        _labels: &[String],
    ) -> Result<Option<String>, NluError> {
        self.classify_calls
            .lock()
            .unwrap()
            .push((locale.to_string(), domain.to_string(), text.to_string()));
        self.check()?;
        Ok(self.classifications.get(text).cloned())
    }

    async fn list_intents(&self) -> Result<Vec<Intent>, NluError> {
        *self.list_calls.lock().unwrap() += 1;
        self.check()?;
        Ok(self.catalog.clone())
    }

    async fn add_intent(&self, intent: &NewIntent) -> Result<Intent, NluError> {
        self.check()?;
        let mut added = self.added_intents.lock().unwrap();
        added.push(intent.clone());
        Ok(Intent::new(format!("created-{}", added.len()), intent.name.clone()))
    }

    async fn add_sentence(&self, intent_id: &str, training_phrase: &str) -> Result<(), NluError> {
        self.check()?;
        self.added_sentences
            .lock()
            .unwrap()
            .push((intent_id.to_string(), training_phrase.to_string()));
        Ok(())
    }
}

// ============================================================================
// Recording messenger
// ============================================================================

/// Messenger that records everything it is asked to send
#[derive(Default)]
pub struct RecordingMessenger {
    replies: Mutex<Vec<(String, Vec<Message>)>>,
    deliveries: Mutex<Vec<(String, Vec<Message>, String)>>,
    fail_replies: AtomicBool,
    fail_deliveries: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail_deliveries.store(fail, Ordering::SeqCst);
    }

    /// (conversation id, messages) per reply call
    pub fn replies(&self) -> Vec<(String, Vec<Message>)> {
        self.replies.lock().unwrap().clone()
    }

    /// (user id, messages, locale) per out-of-band delivery
    pub fn deliveries(&self) -> Vec<(String, Vec<Message>, String)> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Plain text of the most recent reply call
    pub fn last_reply(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .last()
            .map(|(_, messages)| messages.iter().map(Message::plain_text).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn reply(&self, conversation_id: &str, messages: &[Message]) -> Result<(), String> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err("reply endpoint unavailable".to_string());
        }
        self.replies
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), messages.to_vec()));
        Ok(())
    }

    async fn deliver_to(&self, user_id: &str, messages: &[Message], locale: &str) -> Result<(), String> {
        if self.fail_deliveries.load(Ordering::SeqCst) {
            return Err("push endpoint unavailable".to_string());
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((user_id.to_string(), messages.to_vec(), locale.to_string()));
        Ok(())
    }
}

// ============================================================================
// In-memory context store
// ============================================================================

#[derive(Default)]
pub struct InMemoryStore {
    contexts: Mutex<HashMap<String, Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, conversation_id: &str) -> Option<Conversation> {
        self.contexts.lock().unwrap().get(conversation_id).cloned()
    }
}

#[async_trait]
impl ContextStore for InMemoryStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<Conversation>, String> {
        Ok(self.get(conversation_id))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        self.contexts
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), String> {
        self.contexts.lock().unwrap().remove(conversation_id);
        Ok(())
    }
}

// ============================================================================
// Test engine
// ============================================================================

/// Human-response engine wired to mocks, with one conversation under test
pub struct TestEngine {
    pub engine: Engine<Arc<RecordingMessenger>, Arc<InMemoryStore>>,
    pub nlu: Arc<MockNlu>,
    pub messenger: Arc<RecordingMessenger>,
    pub store: Arc<InMemoryStore>,
    pub conversation: Conversation,
}

impl TestEngine {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> TestEngineBuilder {
        TestEngineBuilder::new()
    }

    /// Start with `user` and `question` supplied, as an escalation would
    pub async fn start(&mut self, question: &str) -> Result<Progress, TurnError> {
        let supplied = BTreeMap::from([
            ("user".to_string(), json!({"id": "U1", "language": "ja"})),
            ("question".to_string(), Value::from(question)),
        ]);
        self.engine.start(&mut self.conversation, supplied).await
    }

    pub async fn say(&mut self, text: &str) -> Result<Progress, TurnError> {
        self.engine
            .advance(&mut self.conversation, Some(text.to_string()))
            .await
    }

    pub async fn retry(&mut self) -> Result<Progress, TurnError> {
        self.engine.retry(&mut self.conversation).await
    }

    pub fn confirmed(&self, name: &str) -> Option<&Value> {
        self.conversation.confirmed.get(name)
    }
}

pub struct TestEngineBuilder {
    nlu: MockNlu,
    mode: LearningMode,
    config: EngineConfig,
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self {
            nlu: MockNlu::new(),
            mode: LearningMode::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn nlu(mut self, nlu: MockNlu) -> Self {
        self.nlu = nlu;
        self
    }

    pub fn mode(mut self, mode: LearningMode) -> Self {
        self.mode = mode;
        self
    }

    /// Keep the context after finish (test mode)
    pub fn retain_context(mut self) -> Self {
        self.config.retain_context = true;
        self
    }

    pub fn build(self) -> TestEngine {
        let nlu = Arc::new(self.nlu);
        let messenger = Arc::new(RecordingMessenger::new());
        let store = Arc::new(InMemoryStore::new());
        let skill = Arc::new(HumanResponseSkill::new(nlu.clone(), self.mode));
        let engine = Engine::new(skill, &self.config, messenger.clone(), store.clone())
            .expect("human-response skill is well formed");
        TestEngine {
            engine,
            nlu,
            messenger,
            store,
            conversation: Conversation::new("admin-conv", "en"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::SkillError;
    use crate::state_machine::{ConvState, StalledStep, TransitionError};
    use std::collections::BTreeSet;

    const QUESTION: &str = "Do you ship abroad?";
    const ANSWER: &str = "Yes, to 40 countries.";
    const MENU_HEADER: &str = "Please tell me the number of the question to add this sentence.";

    fn awaiting(parameter: &str) -> Progress {
        Progress::AwaitingInput {
            parameter: parameter.to_string(),
        }
    }

    /// Drive a fresh conversation up to the `enable_learning` question
    async fn answered(t: &mut TestEngine) {
        assert_eq!(t.start(QUESTION).await.unwrap(), awaiting("answer"));
        assert_eq!(t.say(ANSWER).await.unwrap(), awaiting("enable_learning"));
    }

    fn billing_and_shipping() -> MockNlu {
        MockNlu::new().with_catalog(vec![
            Intent::new("welcome-id", "Default Welcome Intent"),
            Intent::new("billing-id", "Billing"),
            Intent::new("shipping-id", "Shipping"),
            Intent::new("escalation-id", "escalation"),
        ])
    }

    #[tokio::test]
    async fn test_start_asks_first_unsupplied_parameter() {
        let mut t = TestEngine::new().build();
        assert_eq!(t.start(QUESTION).await.unwrap(), awaiting("answer"));

        assert_eq!(t.messenger.last_reply(), vec!["OK. Answer please."]);
        let stored = t.store.get("admin-conv").unwrap();
        assert_eq!(stored.state, ConvState::AwaitingInput { parameter: "answer".into() });
        assert_eq!(stored.confirmed_str("question"), Some(QUESTION));
    }

    #[tokio::test]
    async fn test_declining_learning_finishes_with_base_confirmations() {
        let mut t = TestEngine::new().retain_context().build();
        answered(&mut t).await;

        assert_eq!(
            t.say("No").await.unwrap(),
            Progress::Finished { context_cleared: false }
        );
        let keys: Vec<_> = t.conversation.confirmed.keys().map(String::as_str).collect();
        assert_eq!(keys, ["answer", "enable_learning", "question", "user"]);
        assert!(t.nlu.added_intents().is_empty());

        assert_eq!(
            t.messenger.last_reply(),
            vec!["Sure. I will reply to the user with your answer."]
        );
        assert_eq!(
            t.messenger.deliveries(),
            vec![("U1".to_string(), vec![Message::text(ANSWER)], "ja".to_string())]
        );
    }

    #[tokio::test]
    async fn test_free_text_answer_is_stored_normalized() {
        let mut t = TestEngine::new()
            .nlu(MockNlu::new().with_classification("nah", "No"))
            .retain_context()
            .build();
        answered(&mut t).await;

        t.say("nah").await.unwrap();
        assert_eq!(t.confirmed("enable_learning"), Some(&json!("No")));
        assert_eq!(t.nlu.classify_calls()[0].1, "yes_no");
    }

    #[tokio::test]
    async fn test_rejected_answer_is_silent_and_changes_nothing() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        let confirmed_before = t.conversation.confirmed.clone();
        let replies_before = t.messenger.replies().len();

        assert_eq!(t.say("what is this").await.unwrap(), awaiting("enable_learning"));

        assert_eq!(t.conversation.confirmed, confirmed_before);
        assert_eq!(t.conversation.pending.front(), Some("enable_learning"));
        assert_eq!(t.messenger.replies().len(), replies_before);

        // The same parameter still accepts a valid answer afterwards
        assert!(matches!(t.say("No").await.unwrap(), Progress::Finished { .. }));
    }

    #[tokio::test]
    async fn test_new_intent_branch_adds_one_intent_and_delivers_both() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;

        assert_eq!(t.say("Yes").await.unwrap(), awaiting("is_new_intent"));
        assert_eq!(
            t.messenger.last_reply(),
            vec!["Is this a new question or existing one? [New / Existing / No idea]"]
        );

        assert_eq!(
            t.say("New").await.unwrap(),
            Progress::Finished { context_cleared: true }
        );

        let added = t.nlu.added_intents();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, QUESTION);
        assert_eq!(added[0].training_phrase, QUESTION);
        assert_eq!(added[0].response, ANSWER);
        assert!(t.nlu.added_sentences().is_empty());

        assert_eq!(
            t.messenger.last_reply(),
            vec![
                "OK. I will add this question as new one.",
                "Sure. I will reply to the user with your answer.",
            ]
        );
        assert_eq!(t.messenger.deliveries().len(), 1);
        assert!(t.store.get("admin-conv").is_none());
    }

    #[tokio::test]
    async fn test_existing_intent_menu_and_sentence() {
        let mut t = TestEngine::new().nlu(billing_and_shipping()).build();
        answered(&mut t).await;
        t.say("Yes").await.unwrap();

        assert_eq!(t.say("Existing").await.unwrap(), awaiting("intent_id"));
        assert_eq!(
            t.messenger.last_reply(),
            vec![format!("{MENU_HEADER}\n1 Billing\n2 Shipping\n3 New question")]
        );

        assert!(matches!(t.say("2").await.unwrap(), Progress::Finished { .. }));
        assert_eq!(
            t.nlu.added_sentences(),
            vec![("shipping-id".to_string(), QUESTION.to_string())]
        );
        assert!(t.nlu.added_intents().is_empty());
        assert_eq!(
            t.messenger.last_reply()[0],
            "OK. I will add this question as an example sentence."
        );
    }

    #[tokio::test]
    async fn test_menu_selection_bounds() {
        let mut t = TestEngine::new().nlu(billing_and_shipping()).retain_context().build();
        answered(&mut t).await;
        t.say("Yes").await.unwrap();
        t.say("No idea").await.unwrap();

        for out_of_range in ["4", "0", "-1", "Shipping"] {
            assert_eq!(t.say(out_of_range).await.unwrap(), awaiting("intent_id"));
            assert!(t.confirmed("intent_id").is_none());
        }

        assert!(matches!(t.say("3").await.unwrap(), Progress::Finished { .. }));
        assert_eq!(t.confirmed("intent_id"), Some(&Value::Null));
        assert_eq!(t.nlu.added_intents().len(), 1);
        assert!(t.nlu.added_sentences().is_empty());
    }

    #[tokio::test]
    async fn test_last_catalog_entry_is_selectable() {
        let mut t = TestEngine::new().nlu(billing_and_shipping()).retain_context().build();
        answered(&mut t).await;
        t.say("Yes").await.unwrap();
        t.say("Existing").await.unwrap();

        t.say("2").await.unwrap();
        assert_eq!(t.confirmed("intent_id"), Some(&json!("shipping-id")));
    }

    #[tokio::test]
    async fn test_intent_only_mode_skips_the_routing_question() {
        let mut t = TestEngine::new().mode(LearningMode::IntentOnly).build();
        answered(&mut t).await;

        assert!(matches!(t.say("Yes").await.unwrap(), Progress::Finished { .. }));
        assert_eq!(t.nlu.added_intents().len(), 1);
        assert_eq!(t.nlu.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_finish_runs_exactly_once() {
        let mut t = TestEngine::new().retain_context().build();
        answered(&mut t).await;
        t.say("No").await.unwrap();
        assert_eq!(t.conversation.state, ConvState::Finished);

        let again = t.say("No").await;
        assert!(matches!(
            again,
            Err(TurnError::Transition(TransitionError::AlreadyFinished))
        ));
        assert_eq!(t.messenger.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_cleared_context_starts_over() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.say("No").await.unwrap();

        assert_eq!(t.conversation.state, ConvState::Idle);
        assert!(t.conversation.confirmed.is_empty());
        assert!(matches!(
            t.say("hello").await,
            Err(TurnError::Transition(TransitionError::NotStarted))
        ));
    }

    #[tokio::test]
    async fn test_classifier_outage_keeps_question_open() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.nlu.set_failing(true);

        let result = t.say("sure thing").await;
        assert!(matches!(result, Err(TurnError::Skill(SkillError::Backend(_)))));
        assert_eq!(
            t.conversation.state,
            ConvState::AwaitingInput { parameter: "enable_learning".into() }
        );

        t.nlu.set_failing(false);
        assert!(matches!(t.say("Yes").await.unwrap(), Progress::AwaitingInput { .. }));
    }

    #[tokio::test]
    async fn test_reaction_failure_stalls_and_retry_resumes() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.say("Yes").await.unwrap();
        t.nlu.set_failing(true);

        // "New" matches exactly, so only the intent creation hits the backend
        let result = t.say("New").await;
        assert!(matches!(result, Err(TurnError::Skill(SkillError::Backend(_)))));
        assert!(matches!(
            t.conversation.state,
            ConvState::Stalled { step: StalledStep::Reaction { .. }, .. }
        ));
        assert_eq!(t.confirmed("is_new_intent"), Some(&json!("New")));
        assert_eq!(t.confirmed("answer"), Some(&json!(ANSWER)));

        assert!(matches!(
            t.say("hello?").await,
            Err(TurnError::Transition(TransitionError::Stalled(_)))
        ));

        t.nlu.set_failing(false);
        assert!(matches!(t.retry().await.unwrap(), Progress::Finished { .. }));
        assert_eq!(t.nlu.added_intents().len(), 1);
        assert_eq!(t.messenger.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_stalls_finish() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.messenger.fail_deliveries(true);

        let result = t.say("No").await;
        assert!(matches!(result, Err(TurnError::Skill(SkillError::Delivery(_)))));
        assert_eq!(
            t.conversation.state,
            ConvState::Stalled {
                step: StalledStep::Finish {
                    sent: BTreeSet::from(["reply#0".to_string()]),
                },
                message: "Delivery failed: push endpoint unavailable".into(),
            }
        );
        // The acknowledgement was still sent; neither task short-circuits the other
        assert_eq!(
            t.messenger.last_reply(),
            vec!["Sure. I will reply to the user with your answer."]
        );
        let replies = t.messenger.replies().len();

        t.messenger.fail_deliveries(false);
        assert_eq!(
            t.retry().await.unwrap(),
            Progress::Finished { context_cleared: true }
        );
        assert_eq!(t.messenger.deliveries().len(), 1);
        assert_eq!(t.messenger.replies().len(), replies);
    }

    #[tokio::test]
    async fn test_retry_after_failed_ack_does_not_deliver_twice() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.messenger.fail_replies(true);

        let result = t.say("No").await;
        assert!(matches!(result, Err(TurnError::Skill(SkillError::Delivery(_)))));
        assert_eq!(t.messenger.deliveries().len(), 1);

        t.messenger.fail_replies(false);
        assert_eq!(
            t.retry().await.unwrap(),
            Progress::Finished { context_cleared: true }
        );
        assert_eq!(t.messenger.deliveries().len(), 1);
        assert_eq!(
            t.messenger.last_reply(),
            vec!["Sure. I will reply to the user with your answer."]
        );
    }

    #[tokio::test]
    async fn test_retained_context_chains_into_a_new_exchange() {
        let mut t = TestEngine::new().retain_context().build();
        answered(&mut t).await;
        assert_eq!(
            t.say("No").await.unwrap(),
            Progress::Finished { context_cleared: false }
        );

        let progress = t.start("And what about returns?").await.unwrap();
        assert_eq!(progress, Progress::AwaitingInput { parameter: "answer".into() });
        assert_eq!(t.confirmed("question"), Some(&json!("And what about returns?")));
        assert!(t.confirmed("user").is_some());
        assert!(t.confirmed("answer").is_none());
        assert_eq!(t.messenger.last_reply(), vec!["OK. Answer please."]);

        t.say("Within 30 days.").await.unwrap();
        t.say("No").await.unwrap();
        let deliveries = t.messenger.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[1].1, vec![Message::text("Within 30 days.")]);
    }

    #[tokio::test]
    async fn test_failed_prompt_keeps_queued_messages() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.conversation.outbox.push(Message::text("Noted."));
        t.messenger.fail_replies(true);

        assert!(t.engine.advance(&mut t.conversation, None).await.is_err());
        assert_eq!(t.store.get("admin-conv").unwrap().outbox, vec![Message::text("Noted.")]);

        t.messenger.fail_replies(false);
        t.engine.advance(&mut t.conversation, None).await.unwrap();
        assert_eq!(t.messenger.last_reply()[0], "Noted.");
        assert!(t.store.get("admin-conv").unwrap().outbox.is_empty());
    }

    #[tokio::test]
    async fn test_resume_resends_outstanding_prompt() {
        let mut t = TestEngine::new().build();
        t.start(QUESTION).await.unwrap();
        t.engine.advance(&mut t.conversation, None).await.unwrap();

        let replies = t.messenger.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], replies[1]);
    }

    #[tokio::test]
    async fn test_context_survives_reload() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;

        let mut reloaded = t.engine.load("admin-conv", "en").await.unwrap();
        assert_eq!(reloaded, t.conversation);
        let progress = t.engine.advance(&mut reloaded, Some("No".into())).await.unwrap();
        assert!(matches!(progress, Progress::Finished { .. }));
    }

    #[tokio::test]
    async fn test_context_saved_mid_reaction_is_recovered_as_stalled() {
        let mut t = TestEngine::new().build();
        answered(&mut t).await;
        t.say("Yes").await.unwrap();

        // Simulate a crash after the answer was confirmed but before the
        // reaction completed
        let mut crashed = t.conversation.clone();
        crashed.confirmed.insert("is_new_intent".into(), json!("New"));
        crashed.pending.remove("is_new_intent");
        crashed.state = ConvState::Reacting {
            parameter: "is_new_intent".into(),
            outcome: crate::state_machine::Parsed::accepted("New"),
        };
        t.store.save(&crashed).await.unwrap();

        let mut reloaded = t.engine.load("admin-conv", "en").await.unwrap();
        assert!(matches!(
            reloaded.state,
            ConvState::Stalled { step: StalledStep::Reaction { .. }, .. }
        ));
        assert_eq!(t.store.get("admin-conv").unwrap().state, reloaded.state);

        let progress = t.engine.retry(&mut reloaded).await.unwrap();
        assert!(matches!(progress, Progress::Finished { .. }));
        assert_eq!(t.nlu.added_intents().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_nlu_records_calls() {
        let nlu = MockNlu::new().with_classification("nah", "No");
        let labels = vec!["Yes".to_string(), "No".to_string()];
        assert_eq!(
            nlu.classify("en", "yes_no", "nah", &labels).await.unwrap(),
            Some("No".to_string())
        );
        assert_eq!(nlu.classify("en", "yes_no", "hmm", &labels).await.unwrap(), None);
        assert_eq!(nlu.classify_calls().len(), 2);
    }
}
