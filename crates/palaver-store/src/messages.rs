//! CRUD operations for [`Message`] records.
//!
//! Appending a message and bumping the parent conversation's recency key is
//! one transaction; everything else is a plain read or a narrow update.

use chrono::{DateTime, Utc};
use rusqlite::params;

use palaver_shared::{ConversationId, MessageId, MessageKind};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;
use crate::rows;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, kind, content, metadata, created_at";

impl Database {
    /// Insert a message and advance the parent conversation's `updated_at`
    /// to the message timestamp, atomically.
    pub fn append_message(&mut self, message: &Message) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, kind, content, metadata,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.sender_id.as_str(),
                message.kind.as_str(),
                message.content,
                message
                    .metadata
                    .as_ref()
                    .map(|m| m.to_string()),
                message.created_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![
                message.conversation_id.to_string(),
                message.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Fetch a single message by id.
    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List up to `limit` messages of a conversation, newest first. When
    /// `before` is given, only messages strictly earlier than that instant
    /// are returned.
    pub fn list_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ?1
               AND (?2 IS NULL OR created_at < ?2)
             ORDER BY created_at DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![
                conversation_id.to_string(),
                before.map(|b| b.to_rfc3339()),
                limit,
            ],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Overwrite a message's content and/or metadata. Absent fields keep
    /// their stored value; `created_at` is never touched. Returns `true` if
    /// a row was updated.
    pub fn update_message(
        &self,
        id: MessageId,
        content: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages
             SET content  = COALESCE(?2, content),
                 metadata = COALESCE(?3, metadata)
             WHERE id = ?1",
            params![
                id.to_string(),
                content,
                metadata.map(|m| m.to_string()),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Count messages in a conversation created strictly after `after`
    /// (all messages when `after` is `None`).
    pub fn count_messages_after(
        &self,
        conversation_id: ConversationId,
        after: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let count: u64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1
               AND (?2 IS NULL OR created_at > ?2)",
            params![
                conversation_id.to_string(),
                after.map(|a| a.to_rfc3339()),
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The newest message of a conversation, if any.
    pub fn latest_message(&self, conversation_id: ConversationId) -> Result<Option<Message>> {
        let mut messages = self.list_messages(conversation_id, 1, None)?;
        Ok(messages.pop())
    }
}

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind: String = row.get(3)?;
    let metadata: Option<String> = row.get(5)?;
    let metadata = metadata
        .map(|raw| serde_json::from_str(&raw).map_err(|e| rows::conversion_err(5, e)))
        .transpose()?;

    Ok(Message {
        id: MessageId(rows::uuid_col(0, row.get(0)?)?),
        conversation_id: ConversationId(rows::uuid_col(1, row.get(1)?)?),
        sender_id: palaver_shared::ChatUserId(row.get(2)?),
        kind: rows::enum_col(3, kind, MessageKind::parse)?,
        content: row.get(4)?,
        metadata,
        created_at: rows::ts(6, row.get(6)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use palaver_shared::{ChatUserKey, ConversationKind};

    use crate::models::Conversation;

    fn seed_conversation(db: &mut Database) -> ConversationId {
        let now = Utc::now() - Duration::hours(1);
        let convo = Conversation {
            id: ConversationId::new(),
            tenant_app_id: "acme".into(),
            kind: ConversationKind::Direct,
            name: None,
            admin_id: None,
            created_at: now,
            updated_at: now,
        };
        db.create_conversation(&convo, &[]).unwrap();
        convo.id
    }

    fn message(convo: ConversationId, at: DateTime<Utc>) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id: convo,
            sender_id: ChatUserKey::new("acme", "u-1").derived_id(),
            kind: MessageKind::Text,
            content: Some("hello".into()),
            metadata: None,
            created_at: at,
        }
    }

    #[test]
    fn append_bumps_conversation_recency() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = seed_conversation(&mut db);
        let sent_at = Utc::now();

        db.append_message(&message(convo, sent_at)).unwrap();

        let stored = db.get_conversation(convo).unwrap();
        assert_eq!(stored.updated_at, sent_at);
    }

    #[test]
    fn cursor_window_has_no_overlap_or_gap() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = seed_conversation(&mut db);
        let base = Utc::now();

        let msgs: Vec<Message> = (0..5)
            .map(|i| message(convo, base + Duration::seconds(i)))
            .collect();
        for m in &msgs {
            db.append_message(m).unwrap();
        }

        let newest = db.list_messages(convo, 2, None).unwrap();
        assert_eq!(newest[0].id, msgs[4].id);
        assert_eq!(newest[1].id, msgs[3].id);

        let older = db
            .list_messages(convo, 2, Some(newest[1].created_at))
            .unwrap();
        assert_eq!(older[0].id, msgs[2].id);
        assert_eq!(older[1].id, msgs[1].id);
    }

    #[test]
    fn edit_keeps_created_at_and_absent_fields() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = seed_conversation(&mut db);
        let mut msg = message(convo, Utc::now());
        msg.metadata = Some(serde_json::json!({"k": "v"}));
        db.append_message(&msg).unwrap();

        assert!(db.update_message(msg.id, Some("edited"), None).unwrap());

        let stored = db.get_message(msg.id).unwrap();
        assert_eq!(stored.content.as_deref(), Some("edited"));
        assert_eq!(stored.metadata, msg.metadata);
        assert_eq!(stored.created_at, msg.created_at);
    }

    #[test]
    fn unread_counts_follow_the_marker() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = seed_conversation(&mut db);
        let base = Utc::now();
        for i in 0..3 {
            db.append_message(&message(convo, base + Duration::seconds(i)))
                .unwrap();
        }

        assert_eq!(db.count_messages_after(convo, None).unwrap(), 3);
        assert_eq!(
            db.count_messages_after(convo, Some(base)).unwrap(),
            2,
            "strictly-greater comparison"
        );
        assert_eq!(
            db.count_messages_after(convo, Some(base + Duration::seconds(2)))
                .unwrap(),
            0
        );
    }
}
