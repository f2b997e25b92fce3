//! Append-only message log with cursor pagination and offline fan-out.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use palaver_shared::claim::ConnectClaim;
use palaver_shared::{ChatUserId, ConversationId, MessageId, MessageKind};
use palaver_store::{Database, Message};

use crate::error::{or_not_found, Result};
use crate::notify::PushNotification;
use crate::{ChatEngine, ChatError};

/// Page size applied when the caller does not name one.
pub const DEFAULT_MESSAGE_PAGE: u32 = 50;
/// Hard cap on a message page; larger requests are clamped, not rejected.
pub const MAX_MESSAGE_PAGE: u32 = 200;

/// Body shown to offline recipients when a message has no text content.
const ATTACHMENT_FALLBACK_BODY: &str = "Sent an attachment";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub kind: MessageKind,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMessage {
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ChatEngine {
    /// Append a message.
    ///
    /// The insert and the parent conversation's recency bump commit in one
    /// transaction; the offline push fan-out happens strictly after that
    /// commit and its outcome never affects this call.
    pub fn send_message(
        &self,
        claim: &ConnectClaim,
        conversation_id: ConversationId,
        input: SendMessage,
    ) -> Result<Message> {
        let message = Message {
            id: MessageId::new(),
            conversation_id,
            sender_id: claim.user_id(),
            kind: input.kind,
            content: input.content,
            metadata: input.metadata,
            created_at: Utc::now(),
        };

        let notifications = {
            let mut db = self.db();
            db.get_conversation(conversation_id)
                .map_err(or_not_found("conversation"))?;
            db.append_message(&message)?;
            offline_recipients(&db, &message)?
        };

        for notification in notifications {
            self.dispatcher().enqueue(notification);
        }

        tracing::debug!(message = %message.id, conversation = %conversation_id, "message sent");
        Ok(message)
    }

    /// List messages newest-first. Without a cursor the `limit` most recent
    /// are returned; with a cursor (a prior message id) only messages
    /// strictly older than that message.
    pub fn messages(
        &self,
        conversation_id: ConversationId,
        limit: Option<u32>,
        cursor: Option<MessageId>,
    ) -> Result<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_MESSAGE_PAGE).clamp(1, MAX_MESSAGE_PAGE);

        let db = self.db();
        let before = match cursor {
            Some(id) => Some(
                db.get_message(id)
                    .map_err(or_not_found("message"))?
                    .created_at,
            ),
            None => None,
        };
        Ok(db.list_messages(conversation_id, limit, before)?)
    }

    /// Edit a message's content/metadata. Only the sender may edit, and the
    /// original `created_at` is never touched.
    pub fn edit_message(
        &self,
        claim: &ConnectClaim,
        message_id: MessageId,
        input: EditMessage,
    ) -> Result<Message> {
        let db = self.db();
        let existing = db.get_message(message_id).map_err(or_not_found("message"))?;

        if existing.sender_id != claim.user_id() {
            return Err(ChatError::Forbidden("only the sender may edit a message"));
        }

        db.update_message(message_id, input.content.as_deref(), input.metadata.as_ref())?;
        db.get_message(message_id).map_err(or_not_found("message"))
    }
}

/// Classify every participant other than the sender and collect one push
/// request per offline recipient holding a device token.
///
/// Offline means: no presence marker at all, or one that lapsed before the
/// message was created.
fn offline_recipients(db: &Database, message: &Message) -> Result<Vec<PushNotification>> {
    let recipient_ids: Vec<ChatUserId> = db
        .list_participants(message.conversation_id)?
        .into_iter()
        .map(|p| p.user_id)
        .filter(|id| *id != message.sender_id)
        .collect();

    let body = message
        .content
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| ATTACHMENT_FALLBACK_BODY.to_string());

    let notifications = db
        .get_chat_users(&recipient_ids)?
        .into_iter()
        .filter(|user| match user.presence_expires_at {
            None => true,
            Some(expiry) => expiry < message.created_at,
        })
        .filter_map(|user| {
            let token = user.device_token.filter(|t| !t.is_empty())?;
            Some(PushNotification {
                device_token: token,
                device_type: user.device_type,
                title: "New Message".to_string(),
                body: body.clone(),
                conversation_id: message.conversation_id,
            })
        })
        .collect();

    Ok(notifications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use palaver_shared::DeviceType;

    use crate::conversations::CreateConversation;
    use crate::identity::ConnectRequest;
    use crate::testutil;

    fn text(body: &str) -> SendMessage {
        SendMessage {
            kind: MessageKind::Text,
            content: Some(body.to_string()),
            metadata: None,
        }
    }

    fn connect_with_token(engine: &ChatEngine, ext: &str, token: &str) {
        engine
            .connect(ConnectRequest {
                tenant_app_id: "acme".into(),
                external_id: ext.into(),
                display_name: None,
                avatar: None,
                email: None,
                device_token: Some(token.into()),
                device_type: Some(DeviceType::Ios),
            })
            .unwrap();
    }

    /// Force a user's presence window into the past so they classify as
    /// offline.
    fn expire_presence(engine: &ChatEngine, ext: &str) {
        let id = palaver_shared::ChatUserKey::new("acme", ext).derived_id();
        let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
        engine
            .db()
            .conn()
            .execute(
                "UPDATE chat_users SET presence_expires_at = ?2 WHERE id = ?1",
                rusqlite::params![id.as_str(), past],
            )
            .unwrap();
    }

    #[test]
    fn send_into_missing_conversation_is_not_found() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");

        assert!(matches!(
            engine.send_message(&claim, ConversationId::new(), text("hi")),
            Err(ChatError::NotFound("conversation"))
        ));
    }

    #[test]
    fn three_sends_then_windowed_lists() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        let convo = engine
            .create_conversation(
                &claim,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;

        let mut sent = Vec::new();
        for body in ["one", "two", "three"] {
            sent.push(engine.send_message(&claim, convo, text(body)).unwrap());
        }

        let newest = engine.messages(convo, Some(2), None).unwrap();
        assert_eq!(newest[0].id, sent[2].id);
        assert_eq!(newest[1].id, sent[1].id);

        // Cursor at the second-newest returns exactly the oldest one.
        let older = engine.messages(convo, Some(2), Some(sent[1].id)).unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].id, sent[0].id);
    }

    #[test]
    fn unknown_cursor_is_not_found() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        let convo = engine
            .create_conversation(
                &claim,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;

        assert!(matches!(
            engine.messages(convo, None, Some(MessageId::new())),
            Err(ChatError::NotFound("message"))
        ));
    }

    #[test]
    fn oversized_limit_is_clamped() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        let convo = engine
            .create_conversation(
                &claim,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;
        engine.send_message(&claim, convo, text("hi")).unwrap();

        // A pathological limit must not error; it is capped server-side.
        let page = engine.messages(convo, Some(u32::MAX), None).unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn offline_recipients_with_tokens_get_notified() {
        let (engine, mut rx) = testutil::engine();
        let alice = testutil::connected(&engine, "u-1");
        connect_with_token(&engine, "u-2", "tok-bob");
        connect_with_token(&engine, "u-3", "tok-carol");

        let convo = engine
            .create_conversation(
                &alice,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into(), "u-3".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;

        // Bob's presence lapses; Carol stays online.
        expire_presence(&engine, "u-2");

        engine.send_message(&alice, convo, text("hello")).unwrap();

        let delivered = rx.try_recv().unwrap();
        assert_eq!(delivered.device_token, "tok-bob");
        assert_eq!(delivered.body, "hello");
        assert!(rx.try_recv().is_err(), "online user must not be notified");
    }

    #[test]
    fn invitee_who_never_connected_needs_no_token() {
        let (engine, mut rx) = testutil::engine();
        let alice = testutil::connected(&engine, "u-1");

        // u-9 is invited but has no chat_users row at all.
        let convo = engine
            .create_conversation(
                &alice,
                CreateConversation {
                    participant_external_ids: vec!["u-9".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;

        engine.send_message(&alice, convo, text("hi")).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn attachment_messages_fall_back_to_generic_body() {
        let (engine, mut rx) = testutil::engine();
        let alice = testutil::connected(&engine, "u-1");
        connect_with_token(&engine, "u-2", "tok-bob");
        let convo = engine
            .create_conversation(
                &alice,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;
        expire_presence(&engine, "u-2");

        engine
            .send_message(
                &alice,
                convo,
                SendMessage {
                    kind: MessageKind::Image,
                    content: None,
                    metadata: Some(serde_json::json!({"url": "/uploads/x.png"})),
                },
            )
            .unwrap();

        assert_eq!(rx.try_recv().unwrap().body, ATTACHMENT_FALLBACK_BODY);
    }

    #[test]
    fn only_the_sender_may_edit() {
        let (engine, _rx) = testutil::engine();
        let alice = testutil::connected(&engine, "u-1");
        let bob = testutil::connected(&engine, "u-2");
        let convo = engine
            .create_conversation(
                &alice,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into()],
                    name: None,
                },
            )
            .unwrap()
            .id;
        let message = engine.send_message(&alice, convo, text("draft")).unwrap();

        assert!(matches!(
            engine.edit_message(
                &bob,
                message.id,
                EditMessage {
                    content: Some("hijacked".into()),
                    metadata: None,
                }
            ),
            Err(ChatError::Forbidden(_))
        ));

        let edited = engine
            .edit_message(
                &alice,
                message.id,
                EditMessage {
                    content: Some("final".into()),
                    metadata: None,
                },
            )
            .unwrap();
        assert_eq!(edited.content.as_deref(), Some("final"));
        assert_eq!(edited.created_at, message.created_at);
    }
}
