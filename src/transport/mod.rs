pub mod http;

use thiserror::Error;

use crate::types::FetchResult;

pub use http::HttpTransport;

/// One fetch cycle, no internal retries.
pub trait Transport: Send + Sync {
    fn fetch(&self, offset: Option<i64>, timeout_secs: u32) -> FetchResult;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {code}: {description}")]
    Api {
        code: i32,
        description: String,
        retry_after: Option<u64>,
    },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("transport setup failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}
