//! CRUD operations for [`AppClient`] (tenant registry) records.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::AppClient;
use crate::rows;

impl Database {
    /// Register a tenant application. Returns the stored row.
    pub fn create_app_client(&self, id: &str, name: Option<&str>) -> Result<AppClient> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO app_clients (id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![id, name, now.to_rfc3339()],
        )?;
        self.get_app_client(id)
    }

    /// Fetch a single tenant registration.
    pub fn get_app_client(&self, id: &str) -> Result<AppClient> {
        self.conn()
            .query_row(
                "SELECT id, name, created_at, updated_at FROM app_clients WHERE id = ?1",
                params![id],
                row_to_app_client,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all registered tenants, newest first.
    pub fn list_app_clients(&self) -> Result<Vec<AppClient>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, created_at, updated_at FROM app_clients
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_app_client)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Delete a tenant registration. Returns `true` if a row was deleted.
    pub fn delete_app_client(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM app_clients WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_app_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppClient> {
    Ok(AppClient {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: rows::ts(2, row.get(2)?)?,
        updated_at: rows::ts(3, row.get(3)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_list() {
        let db = Database::open_in_memory().unwrap();
        db.create_app_client("acme", Some("Acme Corp")).unwrap();
        db.create_app_client("globex", None).unwrap();

        let clients = db.list_app_clients().unwrap();
        assert_eq!(clients.len(), 2);

        assert!(db.delete_app_client("globex").unwrap());
        assert!(matches!(
            db.get_app_client("globex"),
            Err(StoreError::NotFound)
        ));
    }
}
