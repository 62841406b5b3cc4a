use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, warn};
use serde_json::Value;
use thiserror::Error;

use super::Bot;
use super::stats::Stats;
use crate::error::{BotError, Result};
use crate::types::{Update, UpdateKind};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug)]
pub enum HandlerFailure {
    #[error("{0:#}")]
    Error(anyhow::Error),

    #[error("panicked: {0}")]
    Panic(String),
}

pub struct EventDispatcher {
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    warn_step: usize,
    warned_level: AtomicUsize,
}

impl EventDispatcher {
    pub fn new(workers: NonZeroUsize, queue_warn_threshold: usize) -> Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        let mut handles = Vec::with_capacity(workers.get());
        for i in 0..workers.get() {
            let rx = rx.clone();
            let name = format!("pollbot-worker-{i}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(rx))
                .map_err(|source| BotError::Spawn { name, source })?;
            handles.push(handle);
        }
        info!("[dispatcher] started {} workers", handles.len());

        Ok(EventDispatcher {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            warn_step: queue_warn_threshold,
            warned_level: AtomicUsize::new(0),
        })
    }

    /// `false` when the update had nothing to route.
    pub fn dispatch(&self, bot: &Bot, update: Update) -> Result<bool> {
        let update_id = update.update_id;
        let Some((kind, payload)) = update.route() else {
            debug!("[dispatcher] update {} has no known payload, dropped", update_id);
            Stats::incr(&bot.inner.stats.dropped, 1);
            return Ok(false);
        };

        let job_bot = bot.clone();
        let job: Job = Box::new(move || run_handler(&job_bot, update_id, kind, &payload));

        let depth = {
            let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            let tx = guard.as_ref().ok_or(BotError::DispatcherClosed)?;
            tx.send(job).map_err(|_| BotError::DispatcherClosed)?;
            tx.len()
        };
        Stats::incr(&bot.inner.stats.dispatched, 1);
        self.note_depth(depth);
        Ok(true)
    }

    pub fn queued(&self) -> usize {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Sender::len)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Drains what is queued, then joins the workers.
    pub fn shutdown(&self) {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let current = thread::current().id();
        for handle in handles {
            // A handler may end up here through its bot reference; never join ourselves.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("[dispatcher] worker thread exited abnormally");
            }
        }
        info!("[dispatcher] workers stopped");
    }

    fn note_depth(&self, depth: usize) {
        if self.warn_step == 0 {
            return;
        }
        let level = depth / self.warn_step;
        let prev = self.warned_level.swap(level, Ordering::Relaxed);
        if crosses_new_level(prev, level) {
            warn!("[dispatcher] handler backlog at {} queued updates", depth);
        }
    }
}

fn crosses_new_level(prev: usize, level: usize) -> bool {
    level > prev
}

fn worker_loop(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        job();
    }
}

fn run_handler(bot: &Bot, update_id: i64, kind: UpdateKind, payload: &Value) {
    let sink = bot.inner.sink.as_ref();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match kind {
        UpdateKind::Message => sink.on_message(bot, update_id, payload),
        UpdateKind::EditedMessage => sink.on_edited_message(bot, update_id, payload),
        UpdateKind::InlineQuery => sink.on_inline_query(bot, update_id, payload),
        UpdateKind::ChosenInlineResult => sink.on_chosen_inline_result(bot, update_id, payload),
        UpdateKind::CallbackQuery => sink.on_callback_query(bot, update_id, payload),
    }));

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => HandlerFailure::Error(err),
        Err(panic) => HandlerFailure::Panic(panic_message(panic.as_ref())),
    };
    Stats::incr(&bot.inner.stats.handler_failures, 1);

    let reported = panic::catch_unwind(AssertUnwindSafe(|| {
        sink.on_handler_failure(bot, update_id, kind, &failure)
    }));
    if reported.is_err() {
        error!(
            "[dispatcher] failure callback panicked for update {} ({}): {}",
            update_id, kind, failure
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
