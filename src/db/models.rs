use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use std::fmt;

/// Permission class of a user. Mirrors the rows seeded into `roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "User" => Some(Role::User),
            "Admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let name = value.as_str()?;
        Role::parse(name).ok_or_else(|| FromSqlError::Other(format!("unknown role {name}").into()))
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) const COLUMNS: &'static str =
        "u.id, u.nickname, u.display_name, u.password_hash, u.role_name, u.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            nickname: row.get(1)?,
            display_name: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// A post joined with its author's nickname for display.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_nickname: String,
    pub title: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub(crate) const COLUMNS: &'static str =
        "p.id, p.author_id, u.nickname, p.title, p.text, p.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            author_nickname: row.get(2)?,
            title: row.get(3)?,
            text: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_nickname: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) const COLUMNS: &'static str =
        "c.id, c.post_id, c.author_id, u.nickname, c.text, c.created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            author_id: row.get(2)?,
            author_nickname: row.get(3)?,
            text: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Like {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip_through_parse() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn role_reads_from_sqlite_text() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let role: Role = conn.query_row("SELECT 'Admin'", [], |r| r.get(0)).unwrap();
        assert_eq!(role, Role::Admin);

        let unknown: rusqlite::Result<Role> = conn.query_row("SELECT 'Root'", [], |r| r.get(0));
        assert!(unknown.is_err());
    }
}
