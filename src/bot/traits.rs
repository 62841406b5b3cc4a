use log::error;
use serde_json::Value;

use super::Bot;
use super::dispatcher::HandlerFailure;
use crate::transport::TransportError;
use crate::types::UpdateKind;

pub type HandlerResult = anyhow::Result<()>;

/// Update callbacks run on pool workers; `on_fetch_failure` runs on the poll thread.
pub trait HandlerSink: Send + Sync {
    fn on_message(&self, _bot: &Bot, _update_id: i64, _message: &Value) -> HandlerResult {
        Ok(())
    }

    fn on_edited_message(&self, _bot: &Bot, _update_id: i64, _message: &Value) -> HandlerResult {
        Ok(())
    }

    fn on_inline_query(&self, _bot: &Bot, _update_id: i64, _query: &Value) -> HandlerResult {
        Ok(())
    }

    fn on_chosen_inline_result(
        &self,
        _bot: &Bot,
        _update_id: i64,
        _result: &Value,
    ) -> HandlerResult {
        Ok(())
    }

    fn on_callback_query(&self, _bot: &Bot, _update_id: i64, _query: &Value) -> HandlerResult {
        Ok(())
    }

    fn on_fetch_failure(&self, _bot: &Bot, _error: &TransportError) {}

    fn on_handler_failure(
        &self,
        _bot: &Bot,
        update_id: i64,
        kind: UpdateKind,
        failure: &HandlerFailure,
    ) {
        error!("[dispatcher] {} handler for update {} failed: {}", kind, update_id, failure);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl HandlerSink for NoopSink {}
