use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Claim serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
