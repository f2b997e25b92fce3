//! CRUD operations for [`PortalUser`] records.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::PortalUser;
use crate::rows;

const PORTAL_USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

impl Database {
    /// Insert a portal account. The email column is UNIQUE; inserting a
    /// duplicate surfaces as a SQLite constraint error.
    pub fn create_portal_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<PortalUser> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO portal_users (name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, email, password_hash, now.to_rfc3339()],
        )?;

        let id = self.conn().last_insert_rowid();
        self.get_portal_user(id)
    }

    /// Fetch a portal account by id.
    pub fn get_portal_user(&self, id: i64) -> Result<PortalUser> {
        self.conn()
            .query_row(
                &format!("SELECT {PORTAL_USER_COLUMNS} FROM portal_users WHERE id = ?1"),
                params![id],
                row_to_portal_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch a portal account by email.
    pub fn get_portal_user_by_email(&self, email: &str) -> Result<PortalUser> {
        self.conn()
            .query_row(
                &format!("SELECT {PORTAL_USER_COLUMNS} FROM portal_users WHERE email = ?1"),
                params![email],
                row_to_portal_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all portal accounts.
    pub fn list_portal_users(&self) -> Result<Vec<PortalUser>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PORTAL_USER_COLUMNS} FROM portal_users ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_portal_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Delete a portal account (posts cascade). Returns `true` if deleted.
    pub fn delete_portal_user(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM portal_users WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_portal_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<PortalUser> {
    Ok(PortalUser {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: rows::ts(4, row.get(4)?)?,
        updated_at: rows::ts(5, row.get(5)?)?,
    })
}
