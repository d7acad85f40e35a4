//! services/api/src/adapters/telegram.rs
//!
//! This module contains the adapter for the Telegram Bot API.
//! It implements the `MessageTransport` port from the `core` crate.

use async_trait::async_trait;
use salat_core::domain::UserId;
use salat_core::ports::{MessageTransport, PortError, PortResult, ReplyButton, SendOptions};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `MessageTransport` port using `sendMessage`.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    send_message_url: String,
}

/// The envelope every Bot API method replies with.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramTransport {
    /// Creates a new `TelegramTransport`. `request_timeout` bounds each HTTP call.
    pub fn new(api_url: &str, bot_token: &str, request_timeout: Duration) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            send_message_url: format!("{}/bot{}/sendMessage", api_url, bot_token),
        })
    }
}

/// Builds the `sendMessage` request body.
pub(crate) fn message_payload(user_id: UserId, text: &str, options: &SendOptions) -> Value {
    let mut payload = json!({
        "chat_id": user_id,
        "text": text,
        "disable_notification": options.silent,
    });

    if !options.buttons.is_empty() {
        let row: Vec<Value> = options
            .buttons
            .iter()
            .map(|button| match button {
                ReplyButton::Callback { text, data } => json!({
                    "text": text,
                    "callback_data": data,
                }),
                ReplyButton::WebApp { text, url } => json!({
                    "text": text,
                    "web_app": { "url": url },
                }),
            })
            .collect();
        payload["reply_markup"] = json!({ "inline_keyboard": [row] });
    }

    payload
}

fn map_request_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout(format!("Telegram request timed out: {}", e))
    } else {
        PortError::Unexpected(format!("Telegram request failed: {}", e))
    }
}

//=========================================================================================
// `MessageTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessageTransport for TelegramTransport {
    async fn send_text(&self, user_id: UserId, text: &str, options: &SendOptions) -> PortResult<()> {
        let response = self
            .client
            .post(&self.send_message_url)
            .json(&message_payload(user_id, text, options))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body: Option<BotApiResponse> = response.json().await.ok();
        let description = body
            .as_ref()
            .and_then(|b| b.description.clone())
            .unwrap_or_else(|| status.to_string());

        // Blocked bot, deactivated user, or a chat the bot was never started in.
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(PortError::Rejected(format!("user {}: {}", user_id, description)));
        }
        match body {
            Some(BotApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            _ => Err(PortError::Unexpected(format!(
                "sendMessage to {} failed: {}",
                user_id, description
            ))),
        }
    }
}
