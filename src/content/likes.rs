use rusqlite::Connection;

use crate::auth::identity::Identity;
use crate::auth::policy;
use crate::db::{LikeRepo, PostRepo, UserRepo};
use crate::error::{AppError, AppResult};

/// Outcome of a like/unlike: whether the caller likes the post afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
}

/// Shared guard for every like mutation: a signed-in caller and an existing
/// post. Returns the caller's user id.
fn authorize(conn: &Connection, identity: &Identity, post_id: i64) -> AppResult<i64> {
    let principal = identity.require()?;
    if !policy::can_like(identity) {
        return Err(AppError::Unauthorized);
    }
    if PostRepo::new(conn).find_by_id(post_id)?.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(principal.user_id)
}

/// Like the post if the caller has not, otherwise remove the like.
pub fn toggle_like(conn: &mut Connection, identity: &Identity, post_id: i64) -> AppResult<LikeState> {
    let tx = conn.transaction()?;
    let state = {
        let user_id = authorize(&tx, identity, post_id)?;
        let likes = LikeRepo::new(&tx);
        if likes.find(post_id, user_id)?.is_some() {
            likes.delete(post_id, user_id)?;
            LikeState { liked: false }
        } else {
            likes.insert(post_id, user_id)?;
            LikeState { liked: true }
        }
    };
    tx.commit()?;
    Ok(state)
}

/// Like the post. Liking twice leaves a single like.
pub fn like(conn: &mut Connection, identity: &Identity, post_id: i64) -> AppResult<LikeState> {
    let tx = conn.transaction()?;
    {
        let user_id = authorize(&tx, identity, post_id)?;
        LikeRepo::new(&tx).insert(post_id, user_id)?;
    }
    tx.commit()?;
    Ok(LikeState { liked: true })
}

/// Remove the caller's like, if any.
pub fn unlike(conn: &mut Connection, identity: &Identity, post_id: i64) -> AppResult<LikeState> {
    let tx = conn.transaction()?;
    {
        let user_id = authorize(&tx, identity, post_id)?;
        LikeRepo::new(&tx).delete(post_id, user_id)?;
    }
    tx.commit()?;
    Ok(LikeState { liked: false })
}

pub fn like_count(conn: &Connection, post_id: i64) -> AppResult<i64> {
    Ok(LikeRepo::new(conn).count_for_post(post_id)?)
}

pub fn is_liked_by(conn: &Connection, post_id: i64, nickname: &str) -> AppResult<bool> {
    match UserRepo::new(conn).find_by_nickname(nickname)? {
        Some(user) => Ok(LikeRepo::new(conn).find(post_id, user.id)?.is_some()),
        None => Ok(false),
    }
}
