use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::Session;
use crate::content::comments;
use crate::error::{AppError, AppResult};
use crate::routes::{recover, SIGNIN_PATH};
use crate::state::AppState;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CommentForm {
    #[serde(rename = "comment-text")]
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}/comment/create", post(create))
        .route("/post/{id}/comment/{cid}/delete", get(delete))
}

/// POST /post/{id}/comment/create
async fn create(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let back = format!("/post/{post_id}");
    let result = state.with_conn(|conn| {
        comments::add_comment(conn, &session.identity, post_id, &form.text)
    });

    match result {
        Ok(_) => Ok(Redirect::to(&back).into_response()),
        Err(e) => recover(&state, &session, e, &back),
    }
}

/// GET /post/{id}/comment/{cid}/delete
async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let back = format!("/post/{post_id}");
    let rule = state.config.content.comment_deletion;
    let result = state.with_conn(|conn| {
        // A comment addressed through another post's URL does not exist there.
        if comments::get_comment(conn, comment_id)?.post_id != post_id {
            return Err(AppError::NotFound);
        }
        comments::delete_comment(conn, &session.identity, rule, comment_id)
    });

    match result {
        Ok(_) => Ok(Redirect::to(&back).into_response()),
        Err(e) => recover(&state, &session, e, &back),
    }
}
