use askama::Template;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::{accounts, Session};
use crate::content::posts;
use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::session_cookie;
use crate::routes::home::Html;
use crate::routes::{flash_redirect, recover, Chrome, SIGNIN_PATH};
use crate::state::AppState;

const SIGNUP_PATH: &str = "/users/signup";
const CHANGE_PASSWORD_PATH: &str = "/users/change_password";

// -- Templates --

#[derive(Template)]
#[template(path = "auth/signin.html")]
pub struct SigninTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "auth/change_password.html")]
pub struct ChangePasswordTemplate {
    pub chrome: Chrome,
}

#[derive(Template)]
#[template(path = "users/user_posts.html")]
pub struct UserPostsTemplate {
    pub chrome: Chrome,
    pub nickname: String,
    pub posts: Vec<Post>,
}

// -- Request types --

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SigninForm {
    pub nickname: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct SignupForm {
    pub nickname: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(SIGNIN_PATH, get(signin_page).post(signin))
        .route(SIGNUP_PATH, get(signup_page).post(signup))
        .route(
            CHANGE_PASSWORD_PATH,
            get(change_password_page).post(change_password),
        )
        .route("/users/logout", get(logout))
        .route("/users/{nickname}", get(user_posts))
}

/// GET /users/signin
async fn signin_page(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let conn = state.db.get()?;
    let chrome = Chrome::load(&conn, &session)?;
    Ok(Html(SigninTemplate { chrome }).into_response())
}

/// POST /users/signin: check credentials, rotate the session, go home
async fn signin(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SigninForm>,
) -> AppResult<Response> {
    let auth = &state.config.auth;
    let result = state.with_conn(|conn| {
        accounts::sign_in(
            conn,
            &session,
            &form.nickname,
            &form.password,
            auth.session_hours,
        )
    });

    match result {
        Ok(signed_in) => Ok((
            [(
                header::SET_COOKIE,
                session_cookie(&auth.cookie_name, &signed_in.token, auth.session_hours),
            )],
            Redirect::to("/"),
        )
            .into_response()),
        Err(e) => recover(&state, &session, e, SIGNIN_PATH),
    }
}

/// GET /users/signup
async fn signup_page(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let conn = state.db.get()?;
    let chrome = Chrome::load(&conn, &session)?;
    Ok(Html(SignupTemplate { chrome }).into_response())
}

/// POST /users/signup: create the account, then ask the user to sign in
async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let result = state.with_conn(|conn| {
        accounts::register(
            conn,
            state.config.auth.bcrypt_cost,
            &form.nickname,
            &form.name,
            &form.password,
        )
    });

    match result {
        Ok(_) => flash_redirect(
            &state,
            &session,
            "Your account has been created, please sign in.",
            SIGNIN_PATH,
        ),
        Err(e) => recover(&state, &session, e, SIGNUP_PATH),
    }
}

/// GET /users/change_password
async fn change_password_page(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let conn = state.db.get()?;
    let chrome = Chrome::load(&conn, &session)?;
    Ok(Html(ChangePasswordTemplate { chrome }).into_response())
}

/// POST /users/change_password
async fn change_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<Response> {
    if !session.identity.is_authenticated() {
        return recover(&state, &session, AppError::Unauthorized, SIGNIN_PATH);
    }

    let result = state.with_conn(|conn| {
        accounts::change_password(
            conn,
            state.config.auth.bcrypt_cost,
            &session.identity,
            &form.old_password,
            &form.password,
        )
    });

    match result {
        Ok(()) => flash_redirect(&state, &session, "Your password has been changed!", "/"),
        Err(AppError::InvalidCredentials) => recover(
            &state,
            &session,
            AppError::Validation("Wrong old password!".into()),
            CHANGE_PASSWORD_PATH,
        ),
        Err(e) => recover(&state, &session, e, CHANGE_PASSWORD_PATH),
    }
}

/// GET /users/logout
async fn logout(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let conn = state.db.get()?;
    accounts::sign_out(&conn, &session)?;
    Ok(Redirect::to("/").into_response())
}

/// GET /users/{nickname}: one author's posts
async fn user_posts(
    State(state): State<AppState>,
    session: Session,
    Path(nickname): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = posts::list_posts_by_author(&conn, &nickname)?;
    let chrome = Chrome::load(&conn, &session)?;

    Ok(Html(UserPostsTemplate {
        chrome,
        nickname,
        posts,
    })
    .into_response())
}
