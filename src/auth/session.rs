use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::auth::identity::{Identity, Principal};
use crate::db::models::Role;

/// A server-side session, keyed by the opaque token held in the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
    /// Set when the token was minted during this request and the cookie still
    /// has to be sent.
    pub is_new: bool,
}

/// A fresh anonymous session that is not stored yet. Browsing needs no row;
/// one is written the first time something must outlive the request.
pub fn anonymous() -> Session {
    Session {
        token: generate_token(),
        identity: Identity::Anonymous,
        is_new: true,
    }
}

/// Create and store an anonymous session.
pub fn create_anonymous(conn: &Connection, hours: u64) -> rusqlite::Result<Session> {
    let session = anonymous();
    conn.execute(
        "INSERT INTO sessions (token, expires_at) VALUES (?1, datetime('now', ?2))",
        params![session.token, format!("+{} hours", hours)],
    )?;
    Ok(session)
}

/// Whether a live row exists for `token`.
pub fn exists(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
        params![token],
        |row| row.get(0),
    )
}

/// Load a live session. Expired or unknown tokens yield `None`.
pub fn load(conn: &Connection, token: &str) -> rusqlite::Result<Option<Session>> {
    let row = conn
        .query_row(
            "SELECT u.id, u.nickname, u.role_name FROM sessions s
             LEFT JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<Role>>(2)?,
                ))
            },
        )
        .optional()?;

    Ok(row.map(|(user_id, nickname, role)| {
        let identity = match (user_id, nickname, role) {
            (Some(user_id), Some(nickname), Some(role)) => Identity::User(Principal {
                user_id,
                nickname,
                role,
            }),
            _ => Identity::Anonymous,
        };
        Session {
            token: token.to_string(),
            identity,
            is_new: false,
        }
    }))
}

/// Bind a user to the session. The old token is discarded and a new one is
/// issued so a token handed out before sign-in never becomes authenticated.
pub fn establish(
    conn: &Connection,
    old_token: &str,
    principal: Principal,
    hours: u64,
) -> rusqlite::Result<Session> {
    let token = generate_token();
    conn.execute(
        "INSERT INTO sessions (token, user_id, flash, expires_at)
         SELECT ?1, ?2, (SELECT flash FROM sessions WHERE token = ?3), datetime('now', ?4)",
        params![token, principal.user_id, old_token, format!("+{} hours", hours)],
    )?;
    delete(conn, old_token)?;

    Ok(Session {
        token,
        identity: Identity::User(principal),
        is_new: true,
    })
}

/// Drop the user from the session; the session itself lives on, anonymous.
pub fn clear_identity(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE sessions SET user_id = NULL WHERE token = ?1",
        params![token],
    )?;
    Ok(())
}

/// Delete a session by token.
pub fn delete(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Queue a message to show on the next rendered page. Stores the session if
/// it only existed in memory so far.
pub fn set_flash(
    conn: &Connection,
    token: &str,
    message: &str,
    hours: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, flash, expires_at) VALUES (?1, ?2, datetime('now', ?3))
         ON CONFLICT (token) DO UPDATE SET flash = excluded.flash",
        params![token, message, format!("+{} hours", hours)],
    )?;
    Ok(())
}

/// Read and clear the pending flash message.
pub fn take_flash(conn: &Connection, token: &str) -> rusqlite::Result<Option<String>> {
    let flash: Option<String> = conn
        .query_row(
            "SELECT flash FROM sessions WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    if flash.is_some() {
        conn.execute(
            "UPDATE sessions SET flash = NULL WHERE token = ?1",
            params![token],
        )?;
    }
    Ok(flash)
}

/// Remove expired sessions. Returns how many were deleted.
pub fn purge_expired(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{NewUser, UserRepo};

    fn alice(conn: &Connection) -> Principal {
        let user = UserRepo::new(conn)
            .insert(&NewUser {
                nickname: "alice",
                display_name: "Alice",
                password_hash: "hash",
                role: Role::User,
            })
            .unwrap();
        Principal::from(&user)
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn anonymous_session_loads_as_anonymous() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let session = create_anonymous(&conn, 1).unwrap();
        assert!(session.is_new);

        let loaded = load(&conn, &session.token).unwrap().unwrap();
        assert_eq!(loaded.identity, Identity::Anonymous);
        assert!(!loaded.is_new);
        assert!(load(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn unsaved_session_is_stored_by_its_first_flash() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let session = anonymous();
        assert!(session.is_new);
        assert!(!exists(&conn, &session.token).unwrap());
        assert!(load(&conn, &session.token).unwrap().is_none());
        assert_eq!(take_flash(&conn, &session.token).unwrap(), None);

        set_flash(&conn, &session.token, "Welcome", 1).unwrap();
        assert!(exists(&conn, &session.token).unwrap());
        let loaded = load(&conn, &session.token).unwrap().unwrap();
        assert_eq!(loaded.identity, Identity::Anonymous);
        assert_eq!(take_flash(&conn, &session.token).unwrap().as_deref(), Some("Welcome"));
    }

    #[test]
    fn establish_from_an_unsaved_session() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let principal = alice(&conn);

        let anon = anonymous();
        let session = establish(&conn, &anon.token, principal.clone(), 1).unwrap();
        let loaded = load(&conn, &session.token).unwrap().unwrap();
        assert_eq!(loaded.identity, Identity::User(principal));
    }

    #[test]
    fn establish_rotates_token_and_binds_user() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let principal = alice(&conn);

        let anon = create_anonymous(&conn, 1).unwrap();
        set_flash(&conn, &anon.token, "hello", 1).unwrap();
        let session = establish(&conn, &anon.token, principal.clone(), 1).unwrap();

        assert_ne!(session.token, anon.token);
        assert!(load(&conn, &anon.token).unwrap().is_none());

        let loaded = load(&conn, &session.token).unwrap().unwrap();
        assert_eq!(loaded.identity, Identity::User(principal));
        assert_eq!(take_flash(&conn, &session.token).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn clear_identity_keeps_the_session() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let principal = alice(&conn);

        let anon = create_anonymous(&conn, 1).unwrap();
        let session = establish(&conn, &anon.token, principal, 1).unwrap();
        clear_identity(&conn, &session.token).unwrap();

        let loaded = load(&conn, &session.token).unwrap().unwrap();
        assert_eq!(loaded.identity, Identity::Anonymous);
    }

    #[test]
    fn flash_is_read_once() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let session = create_anonymous(&conn, 1).unwrap();

        assert_eq!(take_flash(&conn, &session.token).unwrap(), None);
        set_flash(&conn, &session.token, "Saved", 1).unwrap();
        assert_eq!(take_flash(&conn, &session.token).unwrap().as_deref(), Some("Saved"));
        assert_eq!(take_flash(&conn, &session.token).unwrap(), None);
    }

    #[test]
    fn expired_sessions_are_ignored_and_purged() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO sessions (token, expires_at) VALUES ('old', datetime('now', '-1 hours'))",
            [],
        )
        .unwrap();
        create_anonymous(&conn, 1).unwrap();

        assert!(load(&conn, "old").unwrap().is_none());
        assert_eq!(purge_expired(&conn).unwrap(), 1);
    }
}
