//! Best-effort offline push fan-out.
//!
//! Message persistence hands finished [`PushNotification`]s to the
//! [`NotificationDispatcher`], which queues them on an unbounded channel. A
//! background task drains the queue into the [`PushSender`] collaborator.
//! Delivery failures are logged and never retried; a slow or failing push
//! backend can never add latency to the send path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use palaver_shared::{ConversationId, DeviceType};

/// One push request for one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushNotification {
    pub device_token: String,
    pub device_type: Option<DeviceType>,
    pub title: String,
    pub body: String,
    pub conversation_id: ConversationId,
}

#[derive(Error, Debug)]
#[error("Push delivery failed: {0}")]
pub struct PushError(pub String);

/// The push collaborator. Implementations deliver a single notification and
/// report failure through the `Result` only; the engine never retries.
pub trait PushSender: Send + Sync {
    fn send(&self, notification: &PushNotification) -> Result<(), PushError>;
}

/// Default sender: writes the notification to the log and succeeds. Stands
/// in for FCM/APNs in development and tests.
pub struct LogOnlyPush;

impl PushSender for LogOnlyPush {
    fn send(&self, notification: &PushNotification) -> Result<(), PushError> {
        tracing::info!(
            device = ?notification.device_type,
            token = %notification.device_token,
            conversation = %notification.conversation_id,
            title = %notification.title,
            "push (log only)"
        );
        Ok(())
    }
}

/// Handle used by the engine to queue notifications after a message commit.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<PushNotification>,
}

impl NotificationDispatcher {
    /// Start the background drain task on the current tokio runtime and
    /// return the enqueue handle.
    pub fn spawn(sender: Arc<dyn PushSender>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PushNotification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sender.send(&notification) {
                    tracing::warn!(
                        error = %e,
                        conversation = %notification.conversation_id,
                        "push delivery failed; dropping notification"
                    );
                }
            }
        });

        Self { tx }
    }

    /// Build a dispatcher whose queue is drained by the caller instead of a
    /// background task. Used by tests to observe the fan-out.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PushNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a notification. Never blocks and never fails the caller; if the
    /// drain task is gone the notification is dropped with a warning.
    pub fn enqueue(&self, notification: PushNotification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!("notification task is gone; dropping push");
        }
    }
}
