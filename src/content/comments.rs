use rusqlite::Connection;

use crate::auth::identity::Identity;
use crate::auth::policy::{self, CommentDeletion};
use crate::content::{bounded, COMMENT_MAX};
use crate::db::models::Comment;
use crate::db::{CommentRepo, PostRepo};
use crate::error::{AppError, AppResult};

pub fn add_comment(
    conn: &mut Connection,
    identity: &Identity,
    post_id: i64,
    text: &str,
) -> AppResult<Comment> {
    let principal = identity.require()?;
    if !policy::can_comment(identity) {
        return Err(AppError::Unauthorized);
    }
    let text = bounded("Comment", text, COMMENT_MAX)?;

    let tx = conn.transaction()?;
    let comment = {
        if PostRepo::new(&tx).find_by_id(post_id)?.is_none() {
            return Err(AppError::NotFound);
        }
        let comments = CommentRepo::new(&tx);
        let id = comments.insert(post_id, principal.user_id, text)?;
        comments
            .find_by_id(id)?
            .ok_or_else(|| AppError::Internal(format!("comment {id} vanished after insert")))?
    };
    tx.commit()?;

    Ok(comment)
}

pub fn get_comment(conn: &Connection, comment_id: i64) -> AppResult<Comment> {
    CommentRepo::new(conn)
        .find_by_id(comment_id)?
        .ok_or(AppError::NotFound)
}

/// Delete a comment under the configured deletion rule. Returns the removed
/// comment so callers can redirect back to its post.
pub fn delete_comment(
    conn: &mut Connection,
    identity: &Identity,
    rule: CommentDeletion,
    comment_id: i64,
) -> AppResult<Comment> {
    let principal = identity.require()?;

    let tx = conn.transaction()?;
    let comment = {
        let comments = CommentRepo::new(&tx);
        let comment = comments.find_by_id(comment_id)?.ok_or(AppError::NotFound)?;
        if !policy::can_delete_comment(identity, &comment, rule) {
            return Err(AppError::Unauthorized);
        }
        comments.delete(comment_id)?;
        comment
    };
    tx.commit()?;

    tracing::info!(comment_id, by = %principal.nickname, "Deleted comment");
    Ok(comment)
}
