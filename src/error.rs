use thiserror::Error;

use crate::bot::BotState;

/// Errors surfaced synchronously by the [`Bot`](crate::bot::Bot) lifecycle operations.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("bot is already running (state: {0})")]
    AlreadyRunning(BotState),

    #[error("bot is not running (state: {0})")]
    NotRunning(BotState),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dispatcher is shut down")]
    DispatcherClosed,
}

pub type Result<T> = std::result::Result<T, BotError>;
