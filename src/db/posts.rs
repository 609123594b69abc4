use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Post;

pub struct PostRepo<'c> {
    conn: &'c Connection,
}

impl<'c> PostRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, id: i64) -> rusqlite::Result<Option<Post>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM posts p JOIN users u ON u.id = p.author_id WHERE p.id = ?1",
                    Post::COLUMNS
                ),
                params![id],
                Post::from_row,
            )
            .optional()
    }

    /// All posts, newest first. Posts created in the same instant keep
    /// insertion order (higher id first).
    pub fn list_newest(&self) -> rusqlite::Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.author_id
             ORDER BY p.created_at DESC, p.id DESC",
            Post::COLUMNS
        ))?;
        let posts = stmt
            .query_map([], Post::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    pub fn find_by_author(&self, author_id: i64) -> rusqlite::Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM posts p JOIN users u ON u.id = p.author_id
             WHERE p.author_id = ?1
             ORDER BY p.created_at DESC, p.id DESC",
            Post::COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![author_id], Post::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    /// Inserts a post and returns its id.
    pub fn insert(&self, author_id: i64, title: &str, text: &str) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO posts (author_id, title, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![author_id, title, text, Utc::now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update(&self, id: i64, title: &str, text: &str) -> rusqlite::Result<bool> {
        let rows = self.conn.execute(
            "UPDATE posts SET title = ?1, text = ?2 WHERE id = ?3",
            params![title, text, id],
        )?;
        Ok(rows > 0)
    }

    /// Deletes only the post row; comments and likes must already be gone.
    pub fn delete(&self, id: i64) -> rusqlite::Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn count(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::users::{NewUser, UserRepo};
    use crate::db::test_pool;

    fn user(conn: &Connection, nickname: &str) -> i64 {
        UserRepo::new(conn)
            .insert(&NewUser {
                nickname,
                display_name: nickname,
                password_hash: "hash",
                role: Role::User,
            })
            .unwrap()
            .id
    }

    #[test]
    fn list_newest_orders_by_time_then_insertion() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let author = user(&conn, "alice");
        let repo = PostRepo::new(&conn);

        // Same timestamp for both rows so only the id breaks the tie.
        conn.execute(
            "INSERT INTO posts (author_id, title, text, created_at)
             VALUES (?1, 'first', 'a', '2024-01-01 00:00:00'),
                    (?1, 'second', 'b', '2024-01-01 00:00:00')",
            params![author],
        )
        .unwrap();
        repo.insert(author, "third", "c").unwrap();

        let titles: Vec<String> = repo
            .list_newest()
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[test]
    fn find_by_author_filters_and_joins_nickname() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = user(&conn, "alice");
        let bob = user(&conn, "bob");
        let repo = PostRepo::new(&conn);

        repo.insert(alice, "a1", "x").unwrap();
        repo.insert(bob, "b1", "y").unwrap();
        repo.insert(alice, "a2", "z").unwrap();

        let posts = repo.find_by_author(alice).unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| p.author_nickname == "alice"));
        assert_eq!(posts[0].title, "a2");
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let alice = user(&conn, "alice");
        let repo = PostRepo::new(&conn);

        let id = repo.insert(alice, "t", "x").unwrap();
        assert!(repo.update(id, "t2", "x2").unwrap());
        assert_eq!(repo.find_by_id(id).unwrap().unwrap().title, "t2");
        assert!(repo.delete(id).unwrap());
        assert!(!repo.delete(id).unwrap());
        assert!(!repo.update(id, "t3", "x3").unwrap());
        assert_eq!(repo.count().unwrap(), 0);
    }
}
