//! Update envelope as returned by `getUpdates`.
//!
//! Payloads stay as raw JSON; only the variant discriminator matters to the runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transport::TransportError;

/// Outcome of one long-poll cycle.
pub type FetchResult = Result<Vec<Update>, TransportError>;

/// One event from the remote feed. At most one payload field is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_inline_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<Value>,
}

/// The payload kinds the dispatcher knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    EditedMessage,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Message => "message",
            UpdateKind::EditedMessage => "edited_message",
            UpdateKind::InlineQuery => "inline_query",
            UpdateKind::ChosenInlineResult => "chosen_inline_result",
            UpdateKind::CallbackQuery => "callback_query",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Update {
    pub fn new(update_id: i64) -> Self {
        Update {
            update_id,
            ..Default::default()
        }
    }

    /// Builder used by hosts and tests to attach a payload of the given kind.
    pub fn with(mut self, kind: UpdateKind, payload: Value) -> Self {
        let slot = match kind {
            UpdateKind::Message => &mut self.message,
            UpdateKind::EditedMessage => &mut self.edited_message,
            UpdateKind::InlineQuery => &mut self.inline_query,
            UpdateKind::ChosenInlineResult => &mut self.chosen_inline_result,
            UpdateKind::CallbackQuery => &mut self.callback_query,
        };
        *slot = Some(payload);
        self
    }

    /// Picks the payload to dispatch. First populated field wins, in the order
    /// message, edited_message, inline_query, chosen_inline_result, callback_query.
    pub fn route(self) -> Option<(UpdateKind, Value)> {
        let Update {
            message,
            edited_message,
            inline_query,
            chosen_inline_result,
            callback_query,
            ..
        } = self;

        message
            .map(|v| (UpdateKind::Message, v))
            .or_else(|| edited_message.map(|v| (UpdateKind::EditedMessage, v)))
            .or_else(|| inline_query.map(|v| (UpdateKind::InlineQuery, v)))
            .or_else(|| chosen_inline_result.map(|v| (UpdateKind::ChosenInlineResult, v)))
            .or_else(|| callback_query.map(|v| (UpdateKind::CallbackQuery, v)))
    }
}
