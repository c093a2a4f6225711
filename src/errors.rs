//! Typed error hierarchy for the Waypoint client layer.
//!
//! Two top-level enums cover the two failure-prone subsystems:
//! - `StoreError` — remote structured-store access failures
//! - `GenerateError` — text-generation API failures
//!
//! "Not found" is never an error anywhere in this crate: `fetch_one`
//! returns `Ok(None)` and list operations return `Ok(vec![])`.

use std::time::Duration;

use thiserror::Error;

/// Errors from the remote structured store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transport failure on '{collection}': {source}")]
    Transport {
        collection: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Store rejected operation on '{collection}' (status {status}): {message}")]
    Store {
        collection: String,
        status: u16,
        message: String,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Operation timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("Malformed record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the text-generation API.
///
/// Credential, model, and rate-limit failures each carry a distinct
/// user-facing message so callers can surface them without translation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Invalid API credential: {0}")]
    InvalidCredential(String),

    #[error("Unknown model '{model}'. Check the model tier configuration.")]
    UnknownModel { model: String },

    #[error("Rate limit exceeded. Wait a moment before generating again.")]
    RateLimited,

    #[error("Generation request failed: {0}")]
    Api(String),

    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_store_carries_collection_and_status() {
        let err = StoreError::Store {
            collection: "tasks".to_string(),
            status: 500,
            message: "internal".to_string(),
        };
        match &err {
            StoreError::Store { collection, status, .. } => {
                assert_eq!(collection, "tasks");
                assert_eq!(*status, 500);
            }
            _ => panic!("Expected Store variant"),
        }
        assert!(err.to_string().contains("tasks"));
    }

    #[test]
    fn store_error_timeout_carries_duration() {
        let err = StoreError::Timeout {
            waited: Duration::from_secs(5),
        };
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert!(err.to_string().contains("5"));
    }

    #[test]
    fn generate_error_variants_have_distinct_messages() {
        let cred = GenerateError::InvalidCredential("key must start with wp_".into());
        let model = GenerateError::UnknownModel { model: "gpt-0".into() };
        let rate = GenerateError::RateLimited;
        assert!(cred.to_string().contains("credential"));
        assert!(model.to_string().contains("gpt-0"));
        assert!(rate.to_string().contains("Rate limit"));
        assert_ne!(cred.to_string(), model.to_string());
        assert_ne!(model.to_string(), rate.to_string());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let store_err = StoreError::Validation("bad".into());
        assert_std_error(&store_err);
        let gen_err = GenerateError::RateLimited;
        assert_std_error(&gen_err);
    }
}
