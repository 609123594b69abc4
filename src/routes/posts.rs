use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::Session;
use crate::content::likes;
use crate::content::posts::{self, PostDetail};
use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::routes::home::Html;
use crate::routes::{recover, Chrome, SIGNIN_PATH};
use crate::state::AppState;

const CREATE_PATH: &str = "/post/create";

fn detail_path(post_id: i64) -> String {
    format!("/post/{post_id}")
}

// -- Templates --

#[derive(Template)]
#[template(path = "posts/create.html")]
pub struct CreateTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "posts/edit.html")]
pub struct EditTemplate {
    pub chrome: Chrome,
    pub post: Post,
}

#[derive(Template)]
#[template(path = "posts/delete.html")]
pub struct DeleteTemplate {
    pub chrome: Chrome,
    pub post: Post,
}

#[derive(Template)]
#[template(path = "posts/detail.html")]
pub struct DetailTemplate {
    pub chrome: Chrome,
    pub detail: PostDetail,
}

// -- Request types --

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(CREATE_PATH, get(create_page).post(create))
        .route("/post/{id}", get(detail))
        .route("/post/{id}/edit", get(edit_page).post(edit))
        .route("/post/{id}/delete", get(delete_page).post(delete))
        .route("/post/{id}/like", get(like))
        .route("/post/{id}/unlike", get(unlike))
}

/// GET /post/create
async fn create_page(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let conn = state.db.get()?;
    let chrome = Chrome::load(&conn, &session)?;
    Ok(Html(CreateTemplate { chrome }).into_response())
}

/// POST /post/create
async fn create(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| {
        posts::create_post(conn, &session.identity, &form.title, &form.text)
    });

    match result {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e) => recover(&state, &session, e, CREATE_PATH),
    }
}

/// GET /post/{id}: the post with its comments and likes
async fn detail(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let rule = state.config.content.comment_deletion;
    let result = state.with_conn(|conn| {
        let detail = posts::post_detail(conn, &session.identity, rule, post_id)?;
        Ok((detail, Chrome::load(conn, &session)?))
    });

    match result {
        Ok((detail, chrome)) => Ok(Html(DetailTemplate { chrome, detail }).into_response()),
        Err(e) => recover(&state, &session, e, "/"),
    }
}

/// GET /post/{id}/edit
async fn edit_page(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| {
        let post = posts::get_post_for_edit(conn, &session.identity, post_id)?;
        Ok((post, Chrome::load(conn, &session)?))
    });

    match result {
        Ok((post, chrome)) => Ok(Html(EditTemplate { chrome, post }).into_response()),
        Err(e) => recover(&state, &session, e, &detail_path(post_id)),
    }
}

/// POST /post/{id}/edit
async fn edit(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| {
        posts::edit_post(conn, &session.identity, post_id, &form.title, &form.text)
    });

    match result {
        Ok(post) => Ok(Redirect::to(&detail_path(post.id)).into_response()),
        Err(e) => recover(&state, &session, e, &format!("/post/{post_id}/edit")),
    }
}

/// GET /post/{id}/delete: confirmation page
async fn delete_page(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| {
        let post = posts::get_post_for_delete(conn, &session.identity, post_id)?;
        Ok((post, Chrome::load(conn, &session)?))
    });

    match result {
        Ok((post, chrome)) => Ok(Html(DeleteTemplate { chrome, post }).into_response()),
        Err(e) => recover(&state, &session, e, &detail_path(post_id)),
    }
}

/// POST /post/{id}/delete: removes the post with its comments and likes
async fn delete(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result =
        state.with_conn(|conn| posts::delete_post(conn, &session.identity, post_id));

    match result {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(e) => recover(&state, &session, e, &detail_path(post_id)),
    }
}

/// GET /post/{id}/like
async fn like(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| likes::like(conn, &session.identity, post_id));

    match result {
        Ok(_) => Ok(Redirect::to(&detail_path(post_id)).into_response()),
        Err(e) => recover(&state, &session, e, &detail_path(post_id)),
    }
}

/// GET /post/{id}/unlike
async fn unlike(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| likes::unlike(conn, &session.identity, post_id));

    match result {
        Ok(_) => Ok(Redirect::to(&detail_path(post_id)).into_response()),
        Err(e) => recover(&state, &session, e, &detail_path(post_id)),
    }
}
