//! Bot lifecycle: state machine, poll loop and dispatch wiring.

pub mod dispatcher;
pub mod poller;
pub mod state;
pub mod stats;
pub mod traits;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::{BotError, Result};
use crate::transport::Transport;
use crate::types::Update;

pub use dispatcher::{EventDispatcher, HandlerFailure};
pub use poller::Cursor;
pub use state::{AtomicBotState, BotState};
pub use stats::StatsSnapshot;
pub use traits::{HandlerResult, HandlerSink, NoopSink};

#[derive(Clone)]
pub struct Bot {
    inner: Arc<Inner>,
}

struct Inner {
    state: AtomicBotState,
    config: PollConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn HandlerSink>,
    dispatcher: Mutex<Option<Arc<EventDispatcher>>>,
    stats: stats::Stats,
}

impl Bot {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn HandlerSink>,
        config: PollConfig,
    ) -> Self {
        Bot {
            inner: Arc::new(Inner {
                state: AtomicBotState::default(),
                config,
                transport,
                sink,
                dispatcher: Mutex::new(None),
                stats: stats::Stats::default(),
            }),
        }
    }

    pub fn state(&self) -> BotState {
        self.inner.state.load()
    }

    pub fn config(&self) -> &PollConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn start(&self) -> Result<()> {
        let dispatcher = self.begin()?;
        info!("[bot] polling on {:?}", thread::current().name());
        poller::run_loop(self, dispatcher);
        Ok(())
    }

    /// Join the handle to wait for a full stop.
    pub fn start_async(&self) -> Result<JoinHandle<()>> {
        let dispatcher = self.begin()?;
        let bot = self.clone();
        let name = "pollbot-poller".to_string();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || poller::run_loop(&bot, dispatcher))
            .map_err(|source| {
                self.abort_start();
                BotError::Spawn { name, source }
            })
    }

    pub fn stop(&self) -> Result<()> {
        self.inner
            .state
            .transition(BotState::Running, BotState::Stopping)
            .map_err(BotError::NotRunning)?;
        info!("[bot] stop requested");
        Ok(())
    }

    /// Entry for updates that did not come through the poll loop (e.g. a webhook).
    pub fn on_update_received(&self, update: Update) -> Result<bool> {
        stats::Stats::incr(&self.inner.stats.updates, 1);
        let dispatcher = self.dispatcher()?;
        self.dispatch_or_retry(&dispatcher, update)
    }

    /// A finishing poll loop may close `dispatcher` between lookup and submit;
    /// in that case the update goes to a fresh pool.
    fn dispatch_or_retry(&self, dispatcher: &EventDispatcher, update: Update) -> Result<bool> {
        match dispatcher.dispatch(self, update.clone()) {
            Err(BotError::DispatcherClosed) => {
                debug!("[bot] dispatcher closed under update {}, retrying", update.update_id);
                self.dispatcher()?.dispatch(self, update)
            }
            res => res,
        }
    }

    pub fn shutdown_dispatcher(&self) -> Result<()> {
        match self.state() {
            BotState::Idle => {
                if let Some(dispatcher) = self.take_dispatcher() {
                    dispatcher.shutdown();
                }
                Ok(())
            }
            state => Err(BotError::AlreadyRunning(state)),
        }
    }

    fn begin(&self) -> Result<Arc<EventDispatcher>> {
        self.inner
            .state
            .transition(BotState::Idle, BotState::Starting)
            .map_err(BotError::AlreadyRunning)?;
        self.dispatcher().inspect_err(|_| self.rollback_start())
    }

    fn abort_start(&self) {
        if let Some(dispatcher) = self.take_dispatcher() {
            dispatcher.shutdown();
        }
        self.rollback_start();
    }

    fn rollback_start(&self) {
        if let Err(state) = self.inner.state.transition(BotState::Starting, BotState::Idle) {
            warn!("[bot] start rollback found state {}, left as is", state);
        }
    }

    fn dispatcher(&self) -> Result<Arc<EventDispatcher>> {
        let mut slot = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(dispatcher) = slot.as_ref().filter(|d| !d.is_closed()) {
            return Ok(dispatcher.clone());
        }
        let config = &self.inner.config;
        let dispatcher = Arc::new(EventDispatcher::new(
            config.workers,
            config.queue_warn_threshold,
        )?);
        *slot = Some(dispatcher.clone());
        Ok(dispatcher)
    }

    fn take_dispatcher(&self) -> Option<Arc<EventDispatcher>> {
        self.inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
