use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Role, User};

pub struct NewUser<'a> {
    pub nickname: &'a str,
    pub display_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

/// Queries over the `users` table. Borrows a connection (or a transaction,
/// which derefs to one) so several repositories can share a transaction.
pub struct UserRepo<'c> {
    conn: &'c Connection,
}

impl<'c> UserRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_by_id(&self, id: i64) -> rusqlite::Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users u WHERE u.id = ?1", User::COLUMNS),
                params![id],
                User::from_row,
            )
            .optional()
    }

    pub fn find_by_nickname(&self, nickname: &str) -> rusqlite::Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users u WHERE u.nickname = ?1", User::COLUMNS),
                params![nickname],
                User::from_row,
            )
            .optional()
    }

    pub fn insert(&self, new: &NewUser<'_>) -> rusqlite::Result<User> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO users (nickname, display_name, password_hash, role_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.nickname,
                new.display_name,
                new.password_hash,
                new.role,
                created_at
            ],
        )?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            nickname: new.nickname.to_string(),
            display_name: new.display_name.to_string(),
            password_hash: new.password_hash.to_string(),
            role: new.role,
            created_at,
        })
    }

    pub fn update_password(&self, id: i64, password_hash: &str) -> rusqlite::Result<bool> {
        let rows = self.conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(rows > 0)
    }

    pub fn set_role(&self, id: i64, role: Role) -> rusqlite::Result<bool> {
        let rows = self.conn.execute(
            "UPDATE users SET role_name = ?1 WHERE id = ?2",
            params![role, id],
        )?;
        Ok(rows > 0)
    }
}
