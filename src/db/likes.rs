use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Like;

pub struct LikeRepo<'c> {
    conn: &'c Connection,
}

impl<'c> LikeRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, post_id: i64, user_id: i64) -> rusqlite::Result<Option<Like>> {
        self.conn
            .query_row(
                "SELECT id, post_id, user_id, created_at FROM likes
                 WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
                Like::from_row,
            )
            .optional()
    }

    /// Returns false when the pair was already liked.
    pub fn insert(&self, post_id: i64, user_id: i64) -> rusqlite::Result<bool> {
        let rows = self.conn.execute(
            "INSERT INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(post_id, user_id) DO NOTHING",
            params![post_id, user_id, Utc::now()],
        )?;
        Ok(rows > 0)
    }

    /// Returns false when there was nothing to remove.
    pub fn delete(&self, post_id: i64, user_id: i64) -> rusqlite::Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_by_post(&self, post_id: i64) -> rusqlite::Result<usize> {
        self.conn
            .execute("DELETE FROM likes WHERE post_id = ?1", params![post_id])
    }

    pub fn count_for_post(&self, post_id: i64) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::posts::PostRepo;
    use crate::db::test_pool;
    use crate::db::users::{NewUser, UserRepo};

    #[test]
    fn insert_is_a_no_op_for_an_existing_pair() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = UserRepo::new(&conn)
            .insert(&NewUser {
                nickname: "alice",
                display_name: "Alice",
                password_hash: "hash",
                role: Role::User,
            })
            .unwrap();
        let post = PostRepo::new(&conn).insert(user.id, "t", "x").unwrap();
        let likes = LikeRepo::new(&conn);

        assert!(likes.insert(post, user.id).unwrap());
        assert!(!likes.insert(post, user.id).unwrap());
        assert_eq!(likes.count_for_post(post).unwrap(), 1);
        assert!(likes.find(post, user.id).unwrap().is_some());

        assert!(likes.delete(post, user.id).unwrap());
        assert!(!likes.delete(post, user.id).unwrap());
        assert_eq!(likes.count_for_post(post).unwrap(), 0);
    }
}
