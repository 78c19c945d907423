//! Fetch layer: resolves a dataset URL to parsed JSON.

use crate::error::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Asynchronous-completion fetch, rendered as a blocking call site: the
/// caller runs it off the main thread and feeds the result back through
/// the state store.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Value>;
}

/// HTTP transport over a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        response.json().map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: format!("invalid JSON body: {e}"),
        })
    }
}
