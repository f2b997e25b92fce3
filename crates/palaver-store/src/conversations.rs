//! CRUD operations for [`Conversation`] records.
//!
//! Creation writes the conversation row and its initial participant rows in
//! one transaction; a failure after the conversation insert rolls the whole
//! operation back so partial conversations are never observable.

use rusqlite::params;

use palaver_shared::{ChatUserId, ConversationId, ConversationKind};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Conversation;
use crate::rows;

const CONVERSATION_COLUMNS: &str =
    "id, tenant_app_id, kind, name, admin_id, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new conversation together with its initial participants.
    ///
    /// `participant_ids` must already be deduplicated and include the
    /// creator; every row shares the conversation's `created_at` as its
    /// join timestamp.
    pub fn create_conversation(
        &mut self,
        conversation: &Conversation,
        participant_ids: &[ChatUserId],
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO conversations (id, tenant_app_id, kind, name, admin_id,
                                        created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                conversation.id.to_string(),
                conversation.tenant_app_id,
                conversation.kind.as_str(),
                conversation.name,
                conversation.admin_id.as_ref().map(|a| a.as_str().to_owned()),
                conversation.created_at.to_rfc3339(),
                conversation.updated_at.to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO participants (conversation_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for user_id in participant_ids {
                stmt.execute(params![
                    conversation.id.to_string(),
                    user_id.as_str(),
                    conversation.created_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single conversation by id.
    pub fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.conn()
            .query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id.to_string()],
                row_to_conversation,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List one page of a tenant's conversations, most recently active
    /// first, together with the tenant's total conversation count.
    pub fn list_conversations(
        &self,
        tenant_app_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Conversation>, u64)> {
        let total: u64 = self.conn().query_row(
            "SELECT COUNT(*) FROM conversations WHERE tenant_app_id = ?1",
            params![tenant_app_id],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE tenant_app_id = ?1
             ORDER BY updated_at DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(
            params![tenant_app_id, limit, offset as i64],
            row_to_conversation,
        )?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok((conversations, total))
    }

    /// List the conversations a user participates in, most recently active
    /// first.
    pub fn conversations_for_user(&self, user_id: &ChatUserId) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE id IN (SELECT conversation_id FROM participants WHERE user_id = ?1)
             ORDER BY updated_at DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.as_str()], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Rename a conversation. Returns `true` if a row was updated.
    pub fn update_conversation_name(
        &self,
        id: ConversationId,
        name: Option<&str>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE conversations SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                name,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a conversation row. Participants and messages are NOT
    /// cascaded; see [`Database::purge_conversation`].
    pub fn delete_conversation(&self, id: ConversationId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Remove the participant and message rows left behind by a conversation
    /// deletion, in one transaction. Returns `(participants, messages)`
    /// counts.
    pub fn purge_conversation(&mut self, id: ConversationId) -> Result<(usize, usize)> {
        let tx = self.conn_mut().transaction()?;

        let participants = tx.execute(
            "DELETE FROM participants WHERE conversation_id = ?1",
            params![id.to_string()],
        )?;
        let messages = tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![id.to_string()],
        )?;

        tx.commit()?;
        Ok((participants, messages))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Conversation`].
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let kind: String = row.get(2)?;
    let admin_id: Option<String> = row.get(4)?;

    Ok(Conversation {
        id: ConversationId(rows::uuid_col(0, row.get(0)?)?),
        tenant_app_id: row.get(1)?,
        kind: rows::enum_col(2, kind, ConversationKind::parse)?,
        name: row.get(3)?,
        admin_id: admin_id.map(ChatUserId),
        created_at: rows::ts(5, row.get(5)?)?,
        updated_at: rows::ts(6, row.get(6)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use palaver_shared::ChatUserKey;

    fn conversation(tenant: &str, kind: ConversationKind) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: ConversationId::new(),
            tenant_app_id: tenant.to_string(),
            kind,
            name: None,
            admin_id: Some(ChatUserKey::new(tenant, "admin").derived_id()),
            created_at: now,
            updated_at: now,
        }
    }

    fn member(tenant: &str, ext: &str) -> ChatUserId {
        ChatUserKey::new(tenant, ext).derived_id()
    }

    #[test]
    fn create_seeds_participants_atomically() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = conversation("acme", ConversationKind::Group);
        let members = vec![member("acme", "admin"), member("acme", "u-2")];

        db.create_conversation(&convo, &members).unwrap();

        let stored = db.get_conversation(convo.id).unwrap();
        assert_eq!(stored.kind, ConversationKind::Group);

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM participants WHERE conversation_id = ?1",
                params![convo.id.to_string()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn failed_create_rolls_back_participants() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = conversation("acme", ConversationKind::Direct);
        let members = vec![member("acme", "admin"), member("acme", "u-2")];
        db.create_conversation(&convo, &members).unwrap();

        // Re-inserting the same conversation id must fail and leave the
        // participant table untouched.
        let err = db.create_conversation(&convo, &[member("acme", "u-3")]);
        assert!(err.is_err());

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM participants WHERE conversation_id = ?1",
                params![convo.id.to_string()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn list_pages_by_recency_with_total() {
        let mut db = Database::open_in_memory().unwrap();
        for _ in 0..3 {
            let convo = conversation("acme", ConversationKind::Group);
            db.create_conversation(&convo, &[member("acme", "admin")])
                .unwrap();
        }
        db.create_conversation(&conversation("globex", ConversationKind::Group), &[])
            .unwrap();

        let (page, total) = db.list_conversations("acme", 2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);

        let (rest, _) = db.list_conversations("acme", 2, 2).unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn delete_leaves_orphans_until_purged() {
        let mut db = Database::open_in_memory().unwrap();
        let convo = conversation("acme", ConversationKind::Group);
        db.create_conversation(&convo, &[member("acme", "admin"), member("acme", "u-2")])
            .unwrap();

        assert!(db.delete_conversation(convo.id).unwrap());
        assert!(matches!(
            db.get_conversation(convo.id),
            Err(StoreError::NotFound)
        ));

        // Orphans survive the delete.
        let orphans: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM participants WHERE conversation_id = ?1",
                params![convo.id.to_string()],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 2);

        let (participants, messages) = db.purge_conversation(convo.id).unwrap();
        assert_eq!((participants, messages), (2, 0));
    }
}
