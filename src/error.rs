//! Error types for the dashboard core.

use crate::types::{HandlerKey, Topic};
use thiserror::Error;

/// Main error type for store, registry, and controller operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Subscription already in use: {handler} on {topic}")]
    DuplicateSubscription { topic: Topic, handler: HandlerKey },

    #[error("Subscription does not exist: {handler} on {topic}")]
    SubscriptionNotFound { topic: Topic, handler: HandlerKey },

    #[error("Dataset not in manifest: {0}")]
    DatasetNotInManifest(String),

    #[error("Dataset not loaded: {0}")]
    DatasetNotLoaded(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Missing field {field:?} in dataset {dataset}")]
    MissingField { dataset: String, field: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type for dashboard core operations.
pub type Result<T> = std::result::Result<T, Error>;
