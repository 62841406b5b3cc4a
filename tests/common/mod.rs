//! Shared helpers: a scripted transport, a recording sink, and polling waits.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use pollbot::bot::HandlerFailure;
use pollbot::{Bot, BotState, FetchResult, HandlerResult, HandlerSink, Transport, TransportError, Update, UpdateKind};
use serde_json::{Value, json};

pub const WAIT: Duration = Duration::from_secs(5);

/// Replays scripted fetch results in order, then returns empty batches.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<FetchResult>>,
    offsets: Mutex<Vec<Option<i64>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<FetchResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            offsets: Mutex::new(Vec::new()),
        })
    }

    pub fn idle() -> Arc<Self> {
        Self::new(Vec::new())
    }

    /// Offsets passed to every fetch so far, in call order.
    pub fn offsets(&self) -> Vec<Option<i64>> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.offsets.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn fetch(&self, offset: Option<i64>, _timeout_secs: u32) -> FetchResult {
        self.offsets.lock().unwrap().push(offset);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                thread::sleep(Duration::from_millis(2));
                Ok(Vec::new())
            }
        }
    }
}

/// Records every callback. Update ids listed in `panic_on` / `fail_on` misbehave.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(UpdateKind, i64)>>,
    pub fetch_failures: AtomicUsize,
    pub handler_failures: Mutex<Vec<(i64, UpdateKind, String)>>,
    pub panic_on: Vec<i64>,
    pub fail_on: Vec<i64>,
    pub panic_on_fetch_failure: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(UpdateKind, i64)> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(i64, UpdateKind, String)> {
        self.handler_failures.lock().unwrap().clone()
    }

    fn record(&self, kind: UpdateKind, update_id: i64) -> HandlerResult {
        if self.panic_on.contains(&update_id) {
            panic!("handler exploded on {update_id}");
        }
        if self.fail_on.contains(&update_id) {
            bail!("handler rejected {update_id}");
        }
        self.events.lock().unwrap().push((kind, update_id));
        Ok(())
    }
}

impl HandlerSink for RecordingSink {
    fn on_message(&self, _bot: &Bot, update_id: i64, _message: &Value) -> HandlerResult {
        self.record(UpdateKind::Message, update_id)
    }

    fn on_edited_message(&self, _bot: &Bot, update_id: i64, _message: &Value) -> HandlerResult {
        self.record(UpdateKind::EditedMessage, update_id)
    }

    fn on_inline_query(&self, _bot: &Bot, update_id: i64, _query: &Value) -> HandlerResult {
        self.record(UpdateKind::InlineQuery, update_id)
    }

    fn on_chosen_inline_result(&self, _bot: &Bot, update_id: i64, _result: &Value) -> HandlerResult {
        self.record(UpdateKind::ChosenInlineResult, update_id)
    }

    fn on_callback_query(&self, _bot: &Bot, update_id: i64, _query: &Value) -> HandlerResult {
        self.record(UpdateKind::CallbackQuery, update_id)
    }

    fn on_fetch_failure(&self, _bot: &Bot, _error: &TransportError) {
        self.fetch_failures.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_fetch_failure {
            panic!("fetch failure callback exploded");
        }
    }

    fn on_handler_failure(&self, _bot: &Bot, update_id: i64, kind: UpdateKind, failure: &HandlerFailure) {
        self.handler_failures
            .lock()
            .unwrap()
            .push((update_id, kind, failure.to_string()));
    }
}

pub fn message(update_id: i64) -> Update {
    Update::new(update_id).with(UpdateKind::Message, json!({"message_id": update_id, "text": "hi"}))
}

pub fn api_error() -> TransportError {
    TransportError::Api {
        code: 502,
        description: "Bad Gateway".to_string(),
        retry_after: None,
    }
}

pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Starts `bot`, waits for `calls` fetches, stops it and joins the poll thread.
/// Handlers have all finished when this returns.
pub fn run_for_calls(bot: &Bot, transport: &ScriptedTransport, calls: usize) {
    let handle = bot.start_async().unwrap();
    assert!(wait_until(|| transport.calls() >= calls), "poll loop stalled");
    bot.stop().unwrap();
    handle.join().unwrap();
    assert_eq!(bot.state(), BotState::Idle);
}
