//! Telegram Bot API adapter
//!
//! Plain HTTPS calls through `reqwest`: `getUpdates` long polling for
//! inbound events and the `Outbox` methods for replies.

use super::{InboundEvent, InboundKind, MessageId, TransportError};
use crate::db::ChatId;
use crate::runtime::{EventSink, Outbox};
use crate::ui::{InlineKeyboard, Outgoing};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const API_BASE_URL_DEFAULT: &str = "https://api.telegram.org";

const LONG_POLL_TIMEOUT_SECS: u64 = 25;
/// Must outlive the long poll
const REQUEST_TIMEOUT_SECS: u64 = 35;
const MAX_BACKOFF_SECS: u64 = 30;

const NOT_MODIFIED: &str = "message is not modified";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &'static str) -> Result<T, TransportError> {
        if !self.ok {
            return Err(TransportError::Api {
                method,
                description: self
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            });
        }
        self.result.ok_or_else(|| TransportError::Api {
            method,
            description: "response has no result".to_string(),
        })
    }
}

// ============================================================================
// Update types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TgMessage>,
    #[serde(default)]
    pub callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<TgDocument>,
    #[serde(default)]
    pub dice: Option<TgDice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgDice {
    pub value: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgCallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    /// Absent for inline-mode messages, which carry no chat
    #[serde(default)]
    pub message: Option<TgMessage>,
}

impl Update {
    /// Convert to an inbound event; `None` for update kinds the bot ignores
    pub fn into_inbound(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(InboundEvent {
                chat_id: ChatId(message.chat.id),
                kind: InboundKind::Callback {
                    id: query.id,
                    data: query.data.unwrap_or_default(),
                    message_id: MessageId(message.message_id),
                },
            });
        }

        let message = self.message?;
        let chat_id = ChatId(message.chat.id);
        let kind = if let Some(text) = message.text {
            InboundKind::Text {
                text,
                message_id: MessageId(message.message_id),
            }
        } else if let Some(doc) = message.document {
            InboundKind::Document {
                file_id: doc.file_id,
                file_name: doc.file_name,
            }
        } else if let Some(dice) = message.dice {
            InboundKind::Dice { value: dice.value }
        } else {
            return None;
        };
        Some(InboundEvent { chat_id, kind })
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct EditMessageBody<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct AnswerCallbackBody<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Serialize)]
struct GetUpdatesBody {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct GetFileBody<'a> {
    file_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Bot API client for one bot token
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;
        response
            .json::<ApiResponse<T>>()
            .await?
            .into_result(method)
    }

    /// Long-poll for updates starting at `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &GetUpdatesBody {
                offset,
                timeout: LONG_POLL_TIMEOUT_SECS,
                allowed_updates: ["message", "callback_query"],
            },
        )
        .await
    }
}

#[async_trait]
impl Outbox for TelegramClient {
    async fn send(&self, chat_id: ChatId, message: Outgoing) -> Result<MessageId, TransportError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                &SendMessageBody {
                    chat_id: chat_id.0,
                    text: &message.text,
                    disable_web_page_preview: true,
                    reply_markup: message.keyboard.as_ref(),
                },
            )
            .await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: Outgoing,
    ) -> Result<(), TransportError> {
        let result = self
            .call::<_, serde_json::Value>(
                "editMessageText",
                &EditMessageBody {
                    chat_id: chat_id.0,
                    message_id: message_id.0,
                    text: &message.text,
                    disable_web_page_preview: true,
                    reply_markup: message.keyboard.as_ref(),
                },
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            // Re-rendering identical content is not a failure
            Err(TransportError::Api { description, .. }) if description.contains(NOT_MODIFIED) => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.call::<_, bool>(
            "answerCallbackQuery",
            &AnswerCallbackBody {
                callback_query_id: callback_id,
                text,
            },
        )
        .await
        .map(|_| ())
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<(), TransportError> {
        let info: FileInfo = self.call("getFile", &GetFileBody { file_id }).await?;
        let file_path = info.file_path.ok_or_else(|| TransportError::Api {
            method: "getFile",
            description: "file is not available for download".to_string(),
        })?;

        let bytes = self
            .http
            .get(self.file_url(&file_path))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }
}

// ============================================================================
// Long polling
// ============================================================================

/// Poll `getUpdates` until cancelled, delivering each update to `sink`
pub async fn run_polling(
    client: TelegramClient,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    tracing::info!("Telegram long polling started");
    let mut offset = 0i64;
    let mut backoff = Duration::from_secs(1);

    loop {
        let polled = tokio::select! {
            () = cancel.cancelled() => break,
            polled = client.get_updates(offset) => polled,
        };

        match polled {
            Ok(updates) => {
                backoff = Duration::from_secs(1);
                for update in updates {
                    offset = offset.max(update.update_id.saturating_add(1));
                    let update_id = update.update_id;
                    match update.into_inbound() {
                        Some(event) => sink.deliver(event).await,
                        None => tracing::debug!(update_id, "Ignoring unsupported update"),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, backoff_secs = backoff.as_secs(), "getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_SECS));
            }
        }
    }

    tracing::info!("Telegram long polling stopped");
}
