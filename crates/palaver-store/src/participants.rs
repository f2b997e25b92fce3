//! CRUD operations for [`Participant`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use palaver_shared::{ChatUserId, ConversationId, MessageId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Participant;
use crate::rows;

const PARTICIPANT_COLUMNS: &str =
    "conversation_id, user_id, joined_at, last_read_at, last_read_message_id";

impl Database {
    /// Insert membership rows for the given users. Existing memberships are
    /// silently skipped; returns the number of rows actually inserted.
    pub fn insert_participants(
        &self,
        conversation_id: ConversationId,
        user_ids: &[ChatUserId],
        joined_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut stmt = self.conn().prepare(
            "INSERT OR IGNORE INTO participants (conversation_id, user_id, joined_at)
             VALUES (?1, ?2, ?3)",
        )?;

        let mut inserted = 0;
        for user_id in user_ids {
            inserted += stmt.execute(params![
                conversation_id.to_string(),
                user_id.as_str(),
                joined_at.to_rfc3339(),
            ])?;
        }
        Ok(inserted)
    }

    /// Delete a single membership row. Returns `true` if a row was deleted.
    pub fn delete_participant(
        &self,
        conversation_id: ConversationId,
        user_id: &ChatUserId,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM participants WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation_id.to_string(), user_id.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Fetch one membership row.
    pub fn get_participant(
        &self,
        conversation_id: ConversationId,
        user_id: &ChatUserId,
    ) -> Result<Participant> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {PARTICIPANT_COLUMNS} FROM participants
                     WHERE conversation_id = ?1 AND user_id = ?2"
                ),
                params![conversation_id.to_string(), user_id.as_str()],
                row_to_participant,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all members of a conversation.
    pub fn list_participants(&self, conversation_id: ConversationId) -> Result<Vec<Participant>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants
             WHERE conversation_id = ?1
             ORDER BY joined_at ASC"
        ))?;
        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_participant)?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?);
        }
        Ok(participants)
    }

    /// List a user's membership rows across all conversations.
    pub fn participations_for_user(&self, user_id: &ChatUserId) -> Result<Vec<Participant>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE user_id = ?1"
        ))?;
        let rows = stmt.query_map(params![user_id.as_str()], row_to_participant)?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?);
        }
        Ok(participants)
    }

    /// Advance a participant's read marker. The guard clause keeps
    /// `last_read_at` monotonically non-decreasing: a call carrying an older
    /// timestamp leaves the row unchanged. The (possibly unchanged) row is
    /// returned.
    pub fn advance_read_marker(
        &self,
        conversation_id: ConversationId,
        user_id: &ChatUserId,
        read_at: DateTime<Utc>,
        message_id: MessageId,
    ) -> Result<Participant> {
        self.conn().execute(
            "UPDATE participants
             SET last_read_at = ?3, last_read_message_id = ?4
             WHERE conversation_id = ?1 AND user_id = ?2
               AND (last_read_at IS NULL OR last_read_at < ?3)",
            params![
                conversation_id.to_string(),
                user_id.as_str(),
                read_at.to_rfc3339(),
                message_id.to_string(),
            ],
        )?;

        self.get_participant(conversation_id, user_id)
    }
}

/// Map a `rusqlite::Row` to a [`Participant`].
fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        conversation_id: ConversationId(rows::uuid_col(0, row.get(0)?)?),
        user_id: ChatUserId(row.get(1)?),
        joined_at: rows::ts(2, row.get(2)?)?,
        last_read_at: rows::opt_ts(3, row.get(3)?)?,
        last_read_message_id: rows::opt_uuid_col(4, row.get(4)?)?.map(MessageId),
    })
}
