// basic
pub mod config;
pub mod error;
pub mod types;

// fetch updates
pub mod transport;

// lifecycle, polling and dispatch
pub mod bot;

pub use bot::{Bot, BotState, HandlerResult, HandlerSink, NoopSink};
pub use config::PollConfig;
pub use error::BotError;
pub use transport::{HttpTransport, Transport, TransportError};
pub use types::{FetchResult, Update, UpdateKind};
