//! CRUD operations for [`ChatUser`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use palaver_shared::{ChatUserId, ChatUserKey, DeviceType};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatUser;
use crate::rows;

/// Input to the connect upsert. Optional fields that are `None` leave the
/// stored value untouched.
#[derive(Debug, Clone)]
pub struct ChatUserUpsert {
    pub key: ChatUserKey,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub device_token: Option<String>,
    pub device_type: Option<DeviceType>,
    pub presence_expires_at: DateTime<Utc>,
}

const CHAT_USER_COLUMNS: &str = "id, tenant_app_id, external_id, display_name, avatar, email,
     presence_expires_at, device_token, device_type, created_at, updated_at";

impl Database {
    /// Insert a chat user, or refresh the existing row for the same identity
    /// key. Repeated calls converge to one row per key.
    pub fn upsert_chat_user(&self, upsert: &ChatUserUpsert) -> Result<ChatUser> {
        let id = upsert.key.derived_id();
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO chat_users (id, tenant_app_id, external_id, display_name, avatar,
                                     email, presence_expires_at, device_token, device_type,
                                     created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(id) DO UPDATE SET
                 display_name        = COALESCE(excluded.display_name, display_name),
                 avatar              = COALESCE(excluded.avatar, avatar),
                 email               = COALESCE(excluded.email, email),
                 presence_expires_at = excluded.presence_expires_at,
                 device_token        = COALESCE(excluded.device_token, device_token),
                 device_type         = COALESCE(excluded.device_type, device_type),
                 updated_at          = excluded.updated_at",
            params![
                id.as_str(),
                upsert.key.tenant_app_id,
                upsert.key.external_id,
                upsert.display_name,
                upsert.avatar,
                upsert.email,
                upsert.presence_expires_at.to_rfc3339(),
                upsert.device_token,
                upsert.device_type.map(|d| d.as_str()),
                now.to_rfc3339(),
            ],
        )?;

        self.get_chat_user(&id)
    }

    /// Fetch a single chat user by derived id.
    pub fn get_chat_user(&self, id: &ChatUserId) -> Result<ChatUser> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_USER_COLUMNS} FROM chat_users WHERE id = ?1"),
                params![id.as_str()],
                row_to_chat_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch several chat users at once. Unknown ids are silently absent from
    /// the result.
    pub fn get_chat_users(&self, ids: &[ChatUserId]) -> Result<Vec<ChatUser>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql =
            format!("SELECT {CHAT_USER_COLUMNS} FROM chat_users WHERE id IN ({placeholders})");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(ids.iter().map(|id| id.as_str())),
            row_to_chat_user,
        )?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

/// Map a `rusqlite::Row` to a [`ChatUser`].
fn row_to_chat_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatUser> {
    let device_type: Option<String> = row.get(8)?;
    let device_type = device_type
        .map(|s| rows::enum_col(8, s, DeviceType::parse))
        .transpose()?;

    Ok(ChatUser {
        id: ChatUserId(row.get(0)?),
        tenant_app_id: row.get(1)?,
        external_id: row.get(2)?,
        display_name: row.get(3)?,
        avatar: row.get(4)?,
        email: row.get(5)?,
        presence_expires_at: rows::opt_ts(6, row.get(6)?)?,
        device_token: row.get(7)?,
        device_type,
        created_at: rows::ts(9, row.get(9)?)?,
        updated_at: rows::ts(10, row.get(10)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn upsert(key: ChatUserKey) -> ChatUserUpsert {
        ChatUserUpsert {
            key,
            display_name: Some("Alice".into()),
            avatar: None,
            email: Some("alice@example.com".into()),
            device_token: Some("tok-1".into()),
            device_type: Some(DeviceType::Ios),
            presence_expires_at: Utc::now() + Duration::minutes(10),
        }
    }

    #[test]
    fn upsert_is_idempotent_per_key() {
        let db = Database::open_in_memory().unwrap();
        let key = ChatUserKey::new("acme", "u-1");

        let first = db.upsert_chat_user(&upsert(key.clone())).unwrap();

        let mut second = upsert(key.clone());
        second.display_name = Some("Alice B.".into());
        second.device_token = None; // absent: stored token must survive
        let updated = db.upsert_chat_user(&second).unwrap();

        assert_eq!(first.id, updated.id);
        assert_eq!(first.created_at, updated.created_at);
        assert_eq!(updated.display_name.as_deref(), Some("Alice B."));
        assert_eq!(updated.device_token.as_deref(), Some("tok-1"));

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM chat_users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn get_many_skips_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        let known = db
            .upsert_chat_user(&upsert(ChatUserKey::new("acme", "u-1")))
            .unwrap();
        let missing = ChatUserKey::new("acme", "ghost").derived_id();

        let users = db.get_chat_users(&[known.id.clone(), missing]).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, known.id);
    }
}
