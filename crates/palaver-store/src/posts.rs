//! CRUD operations for [`Post`] records.

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Post;
use crate::rows;

const POST_COLUMNS: &str = "id, title, content, author_id, created_at, updated_at";

impl Database {
    pub fn create_post(&self, title: &str, content: &str, author_id: i64) -> Result<Post> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO posts (title, content, author_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![title, content, author_id, now.to_rfc3339()],
        )?;

        let id = self.conn().last_insert_rowid();
        self.get_post(id)
    }

    pub fn get_post(&self, id: i64) -> Result<Post> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                row_to_post,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], row_to_post)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Update a post's title/content; absent fields keep their stored value.
    pub fn update_post(&self, id: i64, title: Option<&str>, content: Option<&str>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE posts
             SET title      = COALESCE(?2, title),
                 content    = COALESCE(?3, content),
                 updated_at = ?4
             WHERE id = ?1",
            params![id, title, content, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_post(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: row.get(3)?,
        created_at: rows::ts(4, row.get(4)?)?,
        updated_at: rows::ts(5, row.get(5)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_crud_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let author = db
            .create_portal_user("Ops", "ops@example.com", "hash")
            .unwrap();

        let post = db.create_post("Hello", "First post", author.id).unwrap();
        assert!(db.update_post(post.id, Some("Hello again"), None).unwrap());

        let stored = db.get_post(post.id).unwrap();
        assert_eq!(stored.title, "Hello again");
        assert_eq!(stored.content, "First post");

        assert!(db.delete_post(post.id).unwrap());
        assert!(matches!(db.get_post(post.id), Err(StoreError::NotFound)));
    }

    #[test]
    fn author_fk_enforced() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_post("Orphan", "No author", 999).is_err());
    }
}
