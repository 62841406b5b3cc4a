use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use super::{Transport, TransportError};
use crate::config::TelegramCfg;
use crate::types::{FetchResult, Update};

/// Added on top of the long-poll timeout so the client never cuts off a healthy poll.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_updates: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i32>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        if !self.ok {
            return Err(TransportError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_else(|| "unknown error".to_string()),
                retry_after: self.parameters.and_then(|p| p.retry_after),
            });
        }
        self.result
            .ok_or_else(|| TransportError::Decode("`ok` response without `result`".to_string()))
    }
}

#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: Runtime,
    endpoint: String,
    limit: Option<u8>,
    allowed_updates: Option<Vec<String>>,
}

impl HttpTransport {
    pub fn new(cfg: &TelegramCfg, token: &str) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let endpoint = format!("{}/bot{}/getUpdates", cfg.api_url.trim_end_matches('/'), token);
        Ok(HttpTransport {
            client: reqwest::Client::new(),
            runtime,
            endpoint,
            limit: cfg.limit,
            allowed_updates: cfg.allowed_updates.clone(),
        })
    }

    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u32) -> FetchResult {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            limit: self.limit,
            allowed_updates: self.allowed_updates.as_deref(),
        };
        // The URL carries the token, keep it out of errors.
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(Duration::from_secs(u64::from(timeout_secs)) + REQUEST_GRACE)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.without_url()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.without_url()))?;
        debug!("[transport] getUpdates status={} bytes={}", status, bytes.len());

        let parsed: ApiResponse<Vec<Update>> = serde_json::from_slice(&bytes)?;
        parsed.into_result()
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, offset: Option<i64>, timeout_secs: u32) -> FetchResult {
        self.runtime.block_on(self.get_updates(offset, timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_skips_unset_fields() {
        let body = GetUpdates {
            offset: None,
            timeout: 0,
            limit: None,
            allowed_updates: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"timeout":0}"#);
    }

    #[test]
    fn test_error_envelope() {
        let raw = r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":3}}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        match parsed.into_result() {
            Err(TransportError::Api {
                code,
                retry_after,
                ..
            }) => {
                assert_eq!(code, 429);
                assert_eq!(retry_after, Some(3));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let mut cfg = TelegramCfg::new("123:abc");
        cfg.api_url = "http://localhost:8081/".to_string();
        let transport = HttpTransport::new(&cfg, "123:abc").unwrap();
        assert_eq!(transport.endpoint, "http://localhost:8081/bot123:abc/getUpdates");
    }
}
