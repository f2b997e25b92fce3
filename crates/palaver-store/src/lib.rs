//! # palaver-store
//!
//! SQLite persistence for the palaver backend. The crate exposes a
//! synchronous [`Database`] handle that wraps a `rusqlite::Connection` and
//! provides typed CRUD helpers for every domain model; the multi-row groups
//! that must be atomic (conversation creation, message append) run inside
//! explicit transactions.

pub mod app_clients;
pub mod calls;
pub mod chat_users;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod participants;
pub mod portal_users;
pub mod posts;

mod error;
mod rows;

pub use chat_users::ChatUserUpsert;
pub use database::Database;
pub use error::StoreError;
pub use models::*;
