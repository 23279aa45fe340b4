//! Telegram Bot API transport.
//!
//! Inbound commands arrive through `getUpdates` long polling; replies and
//! alerts go out through `sendMessage`. Each inbound message is handled on
//! its own task so a slow Docker call never holds up the poller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::bot::router::Router;
use crate::notify::{NotificationSink, OperatorId};

const API_BASE: &str = "https://api.telegram.org";

/// Seconds Telegram holds a `getUpdates` request open.
const LONG_POLL_SECS: u64 = 30;

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram rejects messages longer than this many UTF-16 code units; counting
/// chars keeps us under it for everything outside the astral planes.
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(
                self.description
                    .unwrap_or_else(|| "no description".to_string()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{API_BASE}/bot{token}"),
        })
    }

    /// Name of the bot the token belongs to. Fails on an invalid token.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.http
            .get(format!("{}/getMe", self.base_url))
            .send()
            .await?
            .json::<ApiResponse<User>>()
            .await?
            .into_result()
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let mut query = vec![("timeout", LONG_POLL_SECS.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        self.http
            .get(format!("{}/getUpdates", self.base_url))
            .query(&query)
            .send()
            .await?
            .json::<ApiResponse<Vec<Update>>>()
            .await?
            .into_result()
    }

    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.http
                .post(format!("{}/sendMessage", self.base_url))
                .json(&SendMessage {
                    chat_id,
                    text: &chunk,
                })
                .send()
                .await?
                .json::<ApiResponse<serde_json::Value>>()
                .await?
                .into_result()?;
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send_message(&self, recipient: OperatorId, text: &str) {
        if let Err(e) = self.send_text(recipient, text).await {
            log::error!("Failed to send message to {recipient}: {e}");
        }
    }
}

/// Split `text` into pieces of at most `limit` chars, preferring line breaks.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Poll for updates until shutdown, dispatching every message to `router`.
pub async fn run_updates(
    client: Arc<TelegramClient>,
    router: Arc<Router>,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!("Bot is polling for updates");
    let mut offset = None;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let updates = tokio::select! {
            result = client.get_updates(offset) => result,
            _ = shutdown.changed() => break,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                log::error!("Failed to fetch updates: {e}");
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    _ = shutdown.changed() => break,
                }
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let (Some(sender), Some(text)) = (message.from, message.text) else {
                continue;
            };

            let client = Arc::clone(&client);
            let router = Arc::clone(&router);
            let chat_id = message.chat.id;
            tokio::spawn(async move {
                if let Some(reply) = router.handle(sender.id, &text).await {
                    client.send_message(chat_id, &reply).await;
                }
            });
        }
    }

    log::warn!("Stopped polling for updates");
}
