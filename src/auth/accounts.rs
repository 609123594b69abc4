use rusqlite::{Connection, ErrorCode};

use crate::auth::identity::{Identity, Principal};
use crate::auth::password;
use crate::auth::session::{self, Session};
use crate::db::models::{Role, User};
use crate::db::users::{NewUser, UserRepo};
use crate::error::{AppError, AppResult};

const NICKNAME_MAX: usize = 50;
const DISPLAY_NAME_MAX: usize = 100;

/// Path segments under `/users/` that would shadow a profile page.
const RESERVED_NICKNAMES: &[&str] = &["signin", "signup", "change_password", "logout"];

fn validate_nickname(nickname: &str) -> AppResult<()> {
    if nickname.is_empty() || nickname.chars().count() > NICKNAME_MAX {
        return Err(AppError::Validation(format!(
            "Nickname must be between 1 and {NICKNAME_MAX} characters."
        )));
    }
    if !nickname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AppError::Validation(
            "Nickname may only contain letters, digits, '_', '-' and '.'.".into(),
        ));
    }
    if nickname.chars().all(|c| c == '.') {
        return Err(AppError::Validation(
            "Nickname must contain a letter, digit, '_' or '-'.".into(),
        ));
    }
    if RESERVED_NICKNAMES.contains(&nickname) {
        return Err(AppError::Validation(format!(
            "The nickname \"{nickname}\" is reserved."
        )));
    }
    Ok(())
}

fn validate_password(raw: &str) -> AppResult<()> {
    if raw.is_empty() {
        return Err(AppError::Validation("Password must not be empty.".into()));
    }
    if raw.len() > password::MAX_PASSWORD_BYTES {
        return Err(AppError::Validation(format!(
            "Password must be at most {} bytes.",
            password::MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

/// A UNIQUE violation on insert means a concurrent sign-up took the nickname
/// between the lookup and the write.
fn insert_error(e: rusqlite::Error) -> AppError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => AppError::DuplicateUser,
        _ => AppError::from(e),
    }
}

/// Create a user with the `User` role. The password is bcrypt-hashed before
/// it reaches the database.
pub fn register(
    conn: &mut Connection,
    cost: u32,
    nickname: &str,
    display_name: &str,
    raw_password: &str,
) -> AppResult<User> {
    let nickname = nickname.trim();
    let display_name = display_name.trim();
    validate_nickname(nickname)?;
    if display_name.is_empty() || display_name.chars().count() > DISPLAY_NAME_MAX {
        return Err(AppError::Validation(format!(
            "Name must be between 1 and {DISPLAY_NAME_MAX} characters."
        )));
    }
    validate_password(raw_password)?;

    let password_hash = password::hash(raw_password, cost)?;

    let tx = conn.transaction()?;
    let user = {
        let users = UserRepo::new(&tx);
        if users.find_by_nickname(nickname)?.is_some() {
            return Err(AppError::DuplicateUser);
        }
        users
            .insert(&NewUser {
                nickname,
                display_name,
                password_hash: &password_hash,
                role: Role::User,
            })
            .map_err(insert_error)?
    };
    tx.commit()?;

    tracing::info!(nickname = %user.nickname, "Registered user");
    Ok(user)
}

/// Check credentials and bind the user to the session, rotating its token.
/// On failure the session is left untouched.
pub fn sign_in(
    conn: &mut Connection,
    current: &Session,
    nickname: &str,
    raw_password: &str,
    session_hours: u64,
) -> AppResult<Session> {
    let user = UserRepo::new(conn).find_by_nickname(nickname.trim())?;
    let user = match user {
        Some(user) if password::verify(raw_password, &user.password_hash) => user,
        _ => {
            tracing::warn!(nickname = %nickname, "Failed sign-in");
            return Err(AppError::InvalidCredentials);
        }
    };

    let tx = conn.transaction()?;
    let session = session::establish(&tx, &current.token, Principal::from(&user), session_hours)?;
    tx.commit()?;

    tracing::info!(nickname = %user.nickname, "Signed in");
    Ok(session)
}

/// Forget who is signed in; the session stays, anonymous.
pub fn sign_out(conn: &Connection, current: &Session) -> AppResult<()> {
    session::clear_identity(conn, &current.token)?;
    Ok(())
}

pub fn change_password(
    conn: &mut Connection,
    cost: u32,
    identity: &Identity,
    old_raw: &str,
    new_raw: &str,
) -> AppResult<()> {
    let principal = identity.require()?;

    let tx = conn.transaction()?;
    {
        let users = UserRepo::new(&tx);
        let user = users
            .find_by_id(principal.user_id)?
            .ok_or(AppError::Unauthorized)?;

        if !password::verify(old_raw, &user.password_hash) {
            return Err(AppError::InvalidCredentials);
        }
        if old_raw == new_raw {
            return Err(AppError::NoOpChange);
        }
        validate_password(new_raw)?;

        users.update_password(user.id, &password::hash(new_raw, cost)?)?;
    }
    tx.commit()?;

    tracing::info!(nickname = %principal.nickname, "Password changed");
    Ok(())
}

/// Grant the Admin role. Existing sessions pick it up on their next request.
pub fn promote(conn: &Connection, nickname: &str) -> AppResult<User> {
    let users = UserRepo::new(conn);
    let mut user = users.find_by_nickname(nickname)?.ok_or(AppError::NotFound)?;
    users.set_role(user.id, Role::Admin)?;
    user.role = Role::Admin;

    tracing::info!(nickname = %user.nickname, "Promoted to admin");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    const COST: u32 = 4;

    #[test]
    fn duplicate_nickname_is_rejected() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        register(&mut conn, COST, "alice", "Alice", "pw").unwrap();
        let second = register(&mut conn, COST, "alice", "Someone else", "pw2");
        assert!(matches!(second, Err(AppError::DuplicateUser)));
    }

    #[test]
    fn register_validates_fields() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        for (nick, name, pw) in [
            ("", "Alice", "pw"),
            ("al ice", "Alice", "pw"),
            ("al/ice", "Alice", "pw"),
            ("signin", "Alice", "pw"),
            (".", "Alice", "pw"),
            ("..", "Alice", "pw"),
            ("alice", "", "pw"),
            ("alice", "Alice", ""),
        ] {
            let result = register(&mut conn, COST, nick, name, pw);
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "{nick:?}/{name:?}/{pw:?} should be rejected"
            );
        }
        assert!(matches!(
            register(&mut conn, COST, &"a".repeat(51), "Alice", "pw"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn register_stores_a_hash_not_the_password() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();

        let user = register(&mut conn, COST, "alice", "Alice", "secret").unwrap();
        assert_ne!(user.password_hash, "secret");
        assert!(password::verify("secret", &user.password_hash));
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn wrong_password_leaves_session_anonymous() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        register(&mut conn, COST, "alice", "Alice", "secret").unwrap();
        let anon = session::create_anonymous(&conn, 1).unwrap();

        let result = sign_in(&mut conn, &anon, "alice", "wrong", 1);
        assert!(matches!(result, Err(AppError::InvalidCredentials)));

        let unknown = sign_in(&mut conn, &anon, "nobody", "secret", 1);
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));

        let loaded = session::load(&conn, &anon.token).unwrap().unwrap();
        assert_eq!(loaded.identity, Identity::Anonymous);
    }

    #[test]
    fn sign_in_then_sign_out() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        register(&mut conn, COST, "alice", "Alice", "secret").unwrap();
        let anon = session::create_anonymous(&conn, 1).unwrap();

        let session = sign_in(&mut conn, &anon, "alice", "secret", 1).unwrap();
        assert_eq!(session.identity.nickname(), Some("alice"));

        sign_out(&conn, &session).unwrap();
        let loaded = session::load(&conn, &session.token).unwrap().unwrap();
        assert!(!loaded.identity.is_authenticated());
    }

    #[test]
    fn change_password_rules() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = register(&mut conn, COST, "alice", "Alice", "old").unwrap();
        let identity = Identity::User(Principal::from(&user));

        assert!(matches!(
            change_password(&mut conn, COST, &Identity::Anonymous, "old", "new"),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            change_password(&mut conn, COST, &identity, "bad", "new"),
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            change_password(&mut conn, COST, &identity, "old", "old"),
            Err(AppError::NoOpChange)
        ));

        let unchanged = UserRepo::new(&conn).find_by_id(user.id).unwrap().unwrap();
        assert_eq!(unchanged.password_hash, user.password_hash);

        change_password(&mut conn, COST, &identity, "old", "new").unwrap();
        let changed = UserRepo::new(&conn).find_by_id(user.id).unwrap().unwrap();
        assert!(password::verify("new", &changed.password_hash));
        assert!(!password::verify("old", &changed.password_hash));
    }

    #[test]
    fn passwords_past_the_bcrypt_limit_are_refused() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let prefix = "a".repeat(password::MAX_PASSWORD_BYTES);
        let long = format!("{prefix}1");

        assert!(matches!(
            register(&mut conn, COST, "alice", "Alice", &long),
            Err(AppError::Validation(_))
        ));

        let user = register(&mut conn, COST, "alice", "Alice", &prefix).unwrap();
        let anon = session::create_anonymous(&conn, 1).unwrap();
        let wrong = sign_in(&mut conn, &anon, "alice", &format!("{prefix}WRONG"), 1);
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

        let identity = Identity::User(Principal::from(&user));
        assert!(matches!(
            change_password(&mut conn, COST, &identity, &long, "new"),
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            change_password(&mut conn, COST, &identity, &prefix, &format!("{prefix}2")),
            Err(AppError::Validation(_))
        ));
        let unchanged = UserRepo::new(&conn).find_by_id(user.id).unwrap().unwrap();
        assert_eq!(unchanged.password_hash, user.password_hash);
    }

    #[test]
    fn unique_violation_on_insert_reports_duplicate_user() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        register(&mut conn, COST, "alice", "Alice", "pw").unwrap();

        // Bypass the lookup so the UNIQUE constraint is what rejects the row.
        let raw = UserRepo::new(&conn)
            .insert(&NewUser {
                nickname: "alice",
                display_name: "Alice",
                password_hash: "hash",
                role: Role::User,
            })
            .unwrap_err();
        assert!(matches!(insert_error(raw), AppError::DuplicateUser));
        assert!(matches!(
            insert_error(rusqlite::Error::QueryReturnedNoRows),
            AppError::Database(_)
        ));
    }

    #[test]
    fn promote_grants_admin() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        register(&mut conn, COST, "alice", "Alice", "pw").unwrap();

        assert_eq!(promote(&conn, "alice").unwrap().role, Role::Admin);
        assert!(matches!(promote(&conn, "bob"), Err(AppError::NotFound)));
    }
}
