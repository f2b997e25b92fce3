//! # palaver-core
//!
//! The conversation/messaging engine: identity resolution for tenant-scoped
//! chat users, conversation lifecycle, participant membership and
//! authorization, append-only message storage with cursor pagination,
//! unread tracking, call-session state and best-effort offline push
//! fan-out.
//!
//! The engine is a synchronous request-processing layer over the shared
//! [`Database`]; every operation completes (success or typed error) within
//! one inbound call. The only asynchronous piece is the notification drain
//! task, which sits strictly outside the request path.

pub mod calls;
pub mod conversations;
pub mod identity;
pub mod messages;
pub mod notify;
pub mod participants;
pub mod unread;

mod error;

use std::sync::{Arc, Mutex, MutexGuard};

use palaver_store::Database;

pub use error::{ChatError, Result};
pub use notify::{LogOnlyPush, NotificationDispatcher, PushError, PushNotification, PushSender};

/// The messaging domain engine. Operation groups are implemented in the
/// sibling modules, one `impl` block per concern.
pub struct ChatEngine {
    db: Arc<Mutex<Database>>,
    dispatcher: NotificationDispatcher,
}

impl ChatEngine {
    pub fn new(db: Arc<Mutex<Database>>, dispatcher: NotificationDispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// Lock the shared database handle.
    ///
    /// A poisoned lock still guards a fully usable connection, so recover
    /// instead of surfacing the poisoning.
    pub(crate) fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }
}
