use thiserror::Error;

use palaver_store::StoreError;

/// Errors produced by the chat engine.
///
/// Every operation returns one of these by value; the engine never raises
/// control-flow panics. `Storage` preserves the underlying cause for logging
/// but is never inspected to make decisions.
#[derive(Error, Debug)]
pub enum ChatError {
    /// A referenced conversation/message/participant/call does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An authorization rule was violated.
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// Reserved for uniqueness violations; currently unused.
    #[error("Conflict: {0}")]
    Conflict(&'static str),

    /// Opaque storage I/O failure. Never retried by the engine.
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Malformed input that slipped past edge validation.
    #[error("Validation: {0}")]
    Validation(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Translate a store-level miss into a typed domain `NotFound`, passing any
/// other storage error through untouched.
pub(crate) fn or_not_found(entity: &'static str) -> impl Fn(StoreError) -> ChatError {
    move |err| match err {
        StoreError::NotFound => ChatError::NotFound(entity),
        other => ChatError::Storage(other),
    }
}
