//! Human response skill
//!
//! Lets an administrator answer a question the bot could not handle. The
//! answer is relayed to the user who asked, and the question can optionally
//! be taught to the NLU backend, either as a new intent or as an extra
//! training sentence of an existing one.

use super::intent_menu::{self, SKIP_INTENTS};
use super::parsers::{NluChoice, NumericSelection};
use super::{Delivery, ParameterSpec, Reaction, Skill, SkillError, Turn};
use crate::config::LearningMode;
use crate::message::Message;
use crate::nlu::{NewIntent, NluBackend};
use crate::state_machine::{Conversation, Parsed};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Action tag given to intents learned from administrator answers
const LEARNED_ACTION: &str = "robot-response";

const YES_NO: &[&str] = &["Yes", "No"];
const NEW_OR_EXISTING: &[&str] = &["New", "Existing", "No idea"];

pub struct HumanResponseSkill {
    required: Vec<ParameterSpec>,
    optional: Vec<ParameterSpec>,
}

impl HumanResponseSkill {
    pub fn new(nlu: Arc<dyn NluBackend>, mode: LearningMode) -> Self {
        let required = vec![
            ParameterSpec::new("user"),
            ParameterSpec::new("question"),
            ParameterSpec::new("answer").with_prompt(Message::text("OK. Answer please.")),
            ParameterSpec::new("enable_learning")
                .with_prompt(Message::confirm("Do you want chabot learn this question?", YES_NO))
                .with_parser(NluChoice::new(nlu.clone(), "yes_no", YES_NO))
                .with_reaction(EnableLearning {
                    nlu: nlu.clone(),
                    mode,
                }),
        ];

        let optional = match mode {
            LearningMode::IntentOnly => Vec::new(),
            LearningMode::IntentAndSentence => vec![
                ParameterSpec::new("is_new_intent")
                    .with_prompt(Message::buttons(
                        "Is this a new question or existing one?",
                        NEW_OR_EXISTING,
                    ))
                    .with_parser(NluChoice::new(nlu.clone(), "is_new_intent", NEW_OR_EXISTING))
                    .with_reaction(IsNewIntent { nlu: nlu.clone() }),
                ParameterSpec::new(intent_menu::SELECTION_PARAMETER)
                    .with_parser(NumericSelection::new(intent_menu::CATALOG_KEY))
                    .with_reaction(IntentSelection { nlu }),
            ],
        };

        Self { required, optional }
    }
}

fn confirmed_text<'a>(conversation: &'a Conversation, name: &str) -> Result<&'a str, SkillError> {
    conversation
        .confirmed_str(name)
        .ok_or_else(|| SkillError::MissingValue(name.to_string()))
}

/// Teach the confirmed question as a new intent answering with the
/// confirmed answer
async fn learn_as_new_intent(
    nlu: &dyn NluBackend,
    conversation: &Conversation,
    turn: &mut Turn,
) -> Result<(), SkillError> {
    let question = confirmed_text(conversation, "question")?;
    let answer = confirmed_text(conversation, "answer")?;
    nlu.add_intent(&NewIntent {
        name: question.to_string(),
        training_phrase: question.to_string(),
        action: LEARNED_ACTION.to_string(),
        response: answer.to_string(),
    })
    .await?;
    turn.queue(Message::text("OK. I will add this question as new one."));
    Ok(())
}

struct EnableLearning {
    nlu: Arc<dyn NluBackend>,
    mode: LearningMode,
}

#[async_trait]
impl Reaction for EnableLearning {
    async fn react(&self, outcome: &Parsed, conversation: &Conversation, turn: &mut Turn) -> Result<(), SkillError> {
        if outcome.value().and_then(Value::as_str) != Some("Yes") {
            return Ok(());
        }
        match self.mode {
            LearningMode::IntentAndSentence => {
                turn.collect("is_new_intent");
                Ok(())
            }
            LearningMode::IntentOnly => learn_as_new_intent(self.nlu.as_ref(), conversation, turn).await,
        }
    }
}

struct IsNewIntent {
    nlu: Arc<dyn NluBackend>,
}

#[async_trait]
impl Reaction for IsNewIntent {
    async fn react(&self, outcome: &Parsed, conversation: &Conversation, turn: &mut Turn) -> Result<(), SkillError> {
        match outcome {
            Parsed::Rejected { .. } => Ok(()),
            Parsed::Accepted { value } if value == "New" => {
                learn_as_new_intent(self.nlu.as_ref(), conversation, turn).await
            }
            Parsed::Accepted { .. } => {
                intent_menu::build_selection_menu(self.nlu.as_ref(), SKIP_INTENTS, turn).await?;
                Ok(())
            }
        }
    }
}

struct IntentSelection {
    nlu: Arc<dyn NluBackend>,
}

#[async_trait]
impl Reaction for IntentSelection {
    async fn react(&self, outcome: &Parsed, conversation: &Conversation, turn: &mut Turn) -> Result<(), SkillError> {
        match outcome.value() {
            None => Ok(()),
            Some(Value::Null) => learn_as_new_intent(self.nlu.as_ref(), conversation, turn).await,
            Some(selected) => {
                let intent_id = selected
                    .as_str()
                    .ok_or_else(|| SkillError::MissingValue("intent_id".to_string()))?;
                let question = confirmed_text(conversation, "question")?;
                self.nlu.add_sentence(intent_id, question).await?;
                turn.queue(Message::text("OK. I will add this question as an example sentence."));
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Skill for HumanResponseSkill {
    fn name(&self) -> &str {
        "human-response"
    }

    fn required(&self) -> &[ParameterSpec] {
        &self.required
    }

    fn optional(&self) -> &[ParameterSpec] {
        &self.optional
    }

    async fn finish(&self, conversation: &Conversation, delivery: &Delivery<'_>) -> Result<(), SkillError> {
        let user = conversation
            .confirmed
            .get("user")
            .ok_or_else(|| SkillError::MissingValue("user".to_string()))?;
        let user_id = user
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SkillError::MissingValue("user.id".to_string()))?;
        let locale = user
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or(&conversation.sender_language);
        let answer = confirmed_text(conversation, "answer")?;

        let (acked, delivered) = futures::join!(
            delivery.reply(Message::text("Sure. I will reply to the user with your answer.")),
            delivery.deliver_to(user_id, Message::text(answer), locale),
        );

        match (acked, delivered) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(ack), Err(send)) => Err(SkillError::Delivery(format!("{ack}; {send}"))),
        }
    }
}
