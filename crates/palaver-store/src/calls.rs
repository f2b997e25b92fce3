//! CRUD operations for [`Call`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use palaver_shared::{CallId, CallStatus, ChatUserId, ConversationId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Call;
use crate::rows;

const CALL_COLUMNS: &str = "id, conversation_id, caller_id, status, started_at, ended_at";

impl Database {
    /// Insert a new call record.
    pub fn insert_call(&self, call: &Call) -> Result<()> {
        self.conn().execute(
            "INSERT INTO calls (id, conversation_id, caller_id, status, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                call.id.to_string(),
                call.conversation_id.to_string(),
                call.caller_id.as_str(),
                call.status.as_str(),
                call.started_at.to_rfc3339(),
                call.ended_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single call by id.
    pub fn get_call(&self, id: CallId) -> Result<Call> {
        self.conn()
            .query_row(
                &format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = ?1"),
                params![id.to_string()],
                row_to_call,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Transition a call to ENDED. Only an ONGOING row is touched; returns
    /// `true` if the transition happened.
    pub fn mark_call_ended(&self, id: CallId, ended_at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE calls SET status = 'ENDED', ended_at = ?2
             WHERE id = ?1 AND status = 'ONGOING'",
            params![id.to_string(), ended_at.to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// List all calls of a conversation, newest first.
    pub fn calls_for_conversation(&self, conversation_id: ConversationId) -> Result<Vec<Call>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE conversation_id = ?1
             ORDER BY started_at DESC"
        ))?;
        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_call)?;

        let mut calls = Vec::new();
        for row in rows {
            calls.push(row?);
        }
        Ok(calls)
    }
}

/// Map a `rusqlite::Row` to a [`Call`].
fn row_to_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<Call> {
    let status: String = row.get(3)?;

    Ok(Call {
        id: CallId(rows::uuid_col(0, row.get(0)?)?),
        conversation_id: ConversationId(rows::uuid_col(1, row.get(1)?)?),
        caller_id: ChatUserId(row.get(2)?),
        status: rows::enum_col(3, status, CallStatus::parse)?,
        started_at: rows::ts(4, row.get(4)?)?,
        ended_at: rows::opt_ts(5, row.get(5)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_shared::ChatUserKey;

    fn ongoing_call() -> Call {
        Call {
            id: CallId::new(),
            conversation_id: ConversationId::new(),
            caller_id: ChatUserKey::new("acme", "u-1").derived_id(),
            status: CallStatus::Ongoing,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    #[test]
    fn end_transitions_once() {
        let db = Database::open_in_memory().unwrap();
        let call = ongoing_call();
        db.insert_call(&call).unwrap();

        assert!(db.mark_call_ended(call.id, Utc::now()).unwrap());
        let ended = db.get_call(call.id).unwrap();
        assert_eq!(ended.status, CallStatus::Ended);
        let first_ended_at = ended.ended_at.unwrap();

        // A second end touches nothing.
        assert!(!db.mark_call_ended(call.id, Utc::now()).unwrap());
        assert_eq!(db.get_call(call.id).unwrap().ended_at.unwrap(), first_ended_at);
    }
}
