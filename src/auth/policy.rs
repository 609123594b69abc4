//! Authorization predicates. Pure functions over the caller's identity and
//! the resource being touched; callers turn a `false` into `Unauthorized`
//! before any write happens.

use serde::Deserialize;

use crate::auth::identity::Identity;
use crate::db::models::{Comment, Post};

/// Who may delete a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentDeletion {
    /// Any signed-in user may delete any comment.
    #[default]
    AnyUser,
    /// Only the comment's author or an Admin, the same rule as posts.
    AuthorOrAdmin,
}

pub fn can_create_post(identity: &Identity) -> bool {
    identity.is_authenticated()
}

pub fn can_edit_post(identity: &Identity, post: &Post) -> bool {
    identity.user_id() == Some(post.author_id)
}

pub fn can_delete_post(identity: &Identity, post: &Post) -> bool {
    can_edit_post(identity, post) || identity.is_admin()
}

pub fn can_comment(identity: &Identity) -> bool {
    identity.is_authenticated()
}

pub fn can_like(identity: &Identity) -> bool {
    identity.is_authenticated()
}

pub fn can_delete_comment(identity: &Identity, comment: &Comment, rule: CommentDeletion) -> bool {
    match rule {
        CommentDeletion::AnyUser => identity.is_authenticated(),
        CommentDeletion::AuthorOrAdmin => {
            identity.user_id() == Some(comment.author_id) || identity.is_admin()
        }
    }
}
