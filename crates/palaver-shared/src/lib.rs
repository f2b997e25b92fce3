//! # palaver-shared
//!
//! Types shared across the palaver workspace: id value types and domain
//! enums, the composite chat-user identity key with its derived opaque id,
//! and the Ed25519 claim signer consumed by the HTTP layer.

pub mod claim;
pub mod constants;
pub mod types;

mod error;

pub use error::ClaimError;
pub use types::*;
