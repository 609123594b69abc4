use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Comment;

pub struct CommentRepo<'c> {
    conn: &'c Connection,
}

impl<'c> CommentRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, id: i64) -> rusqlite::Result<Option<Comment>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM commentaries c JOIN users u ON u.id = c.author_id WHERE c.id = ?1",
                    Comment::COLUMNS
                ),
                params![id],
                Comment::from_row,
            )
            .optional()
    }

    /// Comments on a post, newest first.
    pub fn find_by_post(&self, post_id: i64) -> rusqlite::Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM commentaries c JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at DESC, c.id DESC",
            Comment::COLUMNS
        ))?;
        let comments = stmt
            .query_map(params![post_id], Comment::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub fn insert(&self, post_id: i64, author_id: i64, text: &str) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO commentaries (post_id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![post_id, author_id, text, Utc::now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete(&self, id: i64) -> rusqlite::Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM commentaries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Returns the number of comments removed.
    pub fn delete_by_post(&self, post_id: i64) -> rusqlite::Result<usize> {
        self.conn
            .execute("DELETE FROM commentaries WHERE post_id = ?1", params![post_id])
    }

    pub fn count_for_post(&self, post_id: i64) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM commentaries WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )
    }
}
