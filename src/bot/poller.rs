use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::dispatcher::{EventDispatcher, panic_message};
use super::stats::Stats;
use super::{Bot, BotState};
use crate::types::Update;

/// Offset sent with the next fetch. Owned by the poll loop only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(Option<i64>);

impl Cursor {
    pub fn new(offset: Option<i64>) -> Self {
        Cursor(offset)
    }

    pub fn get(&self) -> Option<i64> {
        self.0
    }

    /// One past the highest id seen; never moves back.
    pub fn advance(&mut self, batch: &[Update]) {
        let Some(max_id) = batch.iter().map(|u| u.update_id).max() else {
            return;
        };
        let next = max_id.saturating_add(1);
        self.0 = Some(self.0.map_or(next, |cur| cur.max(next)));
    }
}

/// Back to `Idle` however the loop ends, unwinding included.
struct IdleOnExit<'a>(&'a Bot);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        let bot = self.0;
        if let Some(dispatcher) = bot.take_dispatcher() {
            dispatcher.shutdown();
        }
        let state = &bot.inner.state;
        // Running only when unwinding; a stop may land between the two attempts.
        let idle = [BotState::Stopping, BotState::Running, BotState::Stopping]
            .into_iter()
            .any(|from| state.transition(from, BotState::Idle).is_ok());
        if !idle {
            warn!("[poller] loop exited while {}, state not reset", state.load());
        }
        info!("[poller] stopped");
    }
}

/// Caller must have won the `Idle -> Starting` edge.
pub(crate) fn run_loop(bot: &Bot, dispatcher: Arc<EventDispatcher>) {
    let _exit = IdleOnExit(bot);
    let inner = &bot.inner;
    let timeout = inner.config.timeout;

    inner.state.store(BotState::Running);
    inner.stats.mark_started();
    info!("[poller] running, timeout={}s workers={}", timeout, inner.config.workers);

    let mut cursor = Cursor::default();
    while inner.state.load() == BotState::Running {
        Stats::incr(&inner.stats.fetches, 1);
        match inner.transport.fetch(cursor.get(), timeout) {
            Ok(batch) => {
                if batch.is_empty() {
                    continue;
                }
                cursor.advance(&batch);
                debug!("[poller] fetched {} updates, next offset {:?}", batch.len(), cursor.get());
                Stats::incr(&inner.stats.updates, batch.len() as u64);
                for update in batch {
                    let update_id = update.update_id;
                    if let Err(err) = dispatcher.dispatch(bot, update) {
                        error!("[poller] failed to dispatch update {}: {}", update_id, err);
                    }
                }
            }
            Err(err) => {
                Stats::incr(&inner.stats.fetch_failures, 1);
                warn!("[poller] fetch failed at offset {:?}: {}", cursor.get(), err);
                let notified = panic::catch_unwind(AssertUnwindSafe(|| {
                    inner.sink.on_fetch_failure(bot, &err)
                }));
                if let Err(panic) = notified {
                    error!(
                        "[poller] fetch failure callback panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
    }
}
