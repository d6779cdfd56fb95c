//! Parley console host
//!
//! Relays one escalated question to an administrator on the terminal:
//! `parley <user-id> <question...>`

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parley::config::Config;
use parley::db::Database;
use parley::message::Message;
use parley::nlu::{DialogflowClient, LoggingBackend, NluBackend};
use parley::runtime::{Engine, Messenger, Progress, SessionManager};
use parley::skill::HumanResponseSkill;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Contexts untouched for this long are dropped at startup
const ABANDONED_AFTER_DAYS: i64 = 7;

/// Prints everything to the terminal
struct ConsoleMessenger;

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn reply(&self, _conversation_id: &str, messages: &[Message]) -> Result<(), String> {
        for message in messages {
            println!("bot> {}", message.plain_text());
        }
        Ok(())
    }

    async fn deliver_to(&self, user_id: &str, messages: &[Message], locale: &str) -> Result<(), String> {
        for message in messages {
            println!("[to {user_id} ({locale})] {}", message.plain_text());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(user_id), question) = (args.next(), args.collect::<Vec<_>>().join(" ")) else {
        eprintln!("usage: parley <user-id> <question...>");
        std::process::exit(2);
    };
    if question.trim().is_empty() {
        eprintln!("usage: parley <user-id> <question...>");
        std::process::exit(2);
    }

    let config = Config::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;
    db.reap_before(Utc::now() - Duration::days(ABANDONED_AFTER_DAYS))?;

    let nlu: Arc<dyn NluBackend> = Arc::new(LoggingBackend::new(Arc::new(DialogflowClient::new(
        &config.dialogflow,
    )?)));
    let skill = Arc::new(HumanResponseSkill::new(nlu, config.learning_mode));
    let engine = Engine::new(skill, &config.engine, ConsoleMessenger, db)?;
    let sessions = SessionManager::new(Arc::new(engine), config.default_language.clone());

    let conversation_id = format!("console-{}", uuid::Uuid::new_v4());
    let supplied = BTreeMap::from([
        (
            "user".to_string(),
            json!({"id": user_id, "language": config.default_language}),
        ),
        ("question".to_string(), json!(question)),
    ]);

    let mut progress = sessions.start(&conversation_id, supplied).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Progress::AwaitingInput { .. } = progress {
        let Some(line) = lines.next_line().await? else {
            tracing::info!(conv_id = %conversation_id, "Input closed, context kept for later");
            return Ok(());
        };

        let result = if line.trim() == "/retry" {
            sessions.retry(&conversation_id).await
        } else {
            sessions.advance(&conversation_id, Some(line)).await
        };

        match result {
            Ok(next) => progress = next,
            Err(e) => eprintln!("error: {e} (type /retry to try the failed step again)"),
        }
    }

    Ok(())
}
