use rusqlite::Connection;

use crate::auth::identity::Identity;
use crate::auth::policy::{self, CommentDeletion};
use crate::content::{bounded, TEXT_MAX, TITLE_MAX};
use crate::db::models::{Comment, Post};
use crate::db::{CommentRepo, LikeRepo, PostRepo, UserRepo};
use crate::error::{AppError, AppResult};

/// A comment as the viewer sees it.
#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub comment: Comment,
    pub can_delete: bool,
}

/// Everything the post page shows.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<CommentEntry>,
    pub like_count: i64,
    pub liked_by_me: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

pub fn create_post(
    conn: &mut Connection,
    identity: &Identity,
    title: &str,
    text: &str,
) -> AppResult<Post> {
    let principal = identity.require()?;
    if !policy::can_create_post(identity) {
        return Err(AppError::Unauthorized);
    }
    let title = bounded("Title", title, TITLE_MAX)?;
    let text = bounded("Text", text, TEXT_MAX)?;

    let tx = conn.transaction()?;
    let post = {
        let posts = PostRepo::new(&tx);
        let id = posts.insert(principal.user_id, title, text)?;
        posts
            .find_by_id(id)?
            .ok_or_else(|| AppError::Internal(format!("post {id} vanished after insert")))?
    };
    tx.commit()?;

    tracing::info!(post_id = post.id, author = %principal.nickname, "Created post");
    Ok(post)
}

pub fn edit_post(
    conn: &mut Connection,
    identity: &Identity,
    post_id: i64,
    title: &str,
    text: &str,
) -> AppResult<Post> {
    identity.require()?;

    let tx = conn.transaction()?;
    let post = {
        let posts = PostRepo::new(&tx);
        let mut post = posts.find_by_id(post_id)?.ok_or(AppError::NotFound)?;
        if !policy::can_edit_post(identity, &post) {
            return Err(AppError::Unauthorized);
        }
        let title = bounded("Title", title, TITLE_MAX)?;
        let text = bounded("Text", text, TEXT_MAX)?;

        posts.update(post_id, title, text)?;
        post.title = title.to_string();
        post.text = text.to_string();
        post
    };
    tx.commit()?;

    Ok(post)
}

/// Delete a post together with its comments and likes.
pub fn delete_post(conn: &mut Connection, identity: &Identity, post_id: i64) -> AppResult<()> {
    let principal = identity.require()?;

    let tx = conn.transaction()?;
    {
        let post = PostRepo::new(&tx)
            .find_by_id(post_id)?
            .ok_or(AppError::NotFound)?;
        if !policy::can_delete_post(identity, &post) {
            return Err(AppError::Unauthorized);
        }

        let comments = CommentRepo::new(&tx).delete_by_post(post_id)?;
        let likes = LikeRepo::new(&tx).delete_by_post(post_id)?;
        PostRepo::new(&tx).delete(post_id)?;

        tracing::info!(
            post_id,
            comments,
            likes,
            by = %principal.nickname,
            "Deleted post"
        );
    }
    tx.commit()?;

    Ok(())
}

pub fn get_post(conn: &Connection, post_id: i64) -> AppResult<Post> {
    PostRepo::new(conn)
        .find_by_id(post_id)?
        .ok_or(AppError::NotFound)
}

/// A post the caller is allowed to edit.
pub fn get_post_for_edit(conn: &Connection, identity: &Identity, post_id: i64) -> AppResult<Post> {
    identity.require()?;
    let post = get_post(conn, post_id)?;
    if !policy::can_edit_post(identity, &post) {
        return Err(AppError::Unauthorized);
    }
    Ok(post)
}

/// A post the caller is allowed to delete.
pub fn get_post_for_delete(
    conn: &Connection,
    identity: &Identity,
    post_id: i64,
) -> AppResult<Post> {
    identity.require()?;
    let post = get_post(conn, post_id)?;
    if !policy::can_delete_post(identity, &post) {
        return Err(AppError::Unauthorized);
    }
    Ok(post)
}

/// All posts, newest first.
pub fn list_posts(conn: &Connection) -> AppResult<Vec<Post>> {
    Ok(PostRepo::new(conn).list_newest()?)
}

/// Posts by one author, newest first. An unknown nickname has no posts.
pub fn list_posts_by_author(conn: &Connection, nickname: &str) -> AppResult<Vec<Post>> {
    match UserRepo::new(conn).find_by_nickname(nickname)? {
        Some(author) => Ok(PostRepo::new(conn).find_by_author(author.id)?),
        None => Ok(Vec::new()),
    }
}

/// The post page for `identity`. `rule` decides which comments the viewer
/// may delete.
pub fn post_detail(
    conn: &Connection,
    identity: &Identity,
    rule: CommentDeletion,
    post_id: i64,
) -> AppResult<PostDetail> {
    let post = get_post(conn, post_id)?;
    let comments = CommentRepo::new(conn)
        .find_by_post(post_id)?
        .into_iter()
        .map(|comment| CommentEntry {
            can_delete: policy::can_delete_comment(identity, &comment, rule),
            comment,
        })
        .collect();
    let likes = LikeRepo::new(conn);
    let like_count = likes.count_for_post(post_id)?;
    let liked_by_me = match identity.user_id() {
        Some(user_id) => likes.find(post_id, user_id)?.is_some(),
        None => false,
    };

    Ok(PostDetail {
        can_edit: policy::can_edit_post(identity, &post),
        can_delete: policy::can_delete_post(identity, &post),
        post,
        comments,
        like_count,
        liked_by_me,
    })
}
