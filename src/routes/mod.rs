pub mod assets;
pub mod comments;
pub mod home;
pub mod posts;
pub mod users;

use axum::middleware;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

use crate::auth::session::{self, Session};
use crate::error::{AppError, AppResult};
use crate::extractors::session_layer;
use crate::state::AppState;

pub const SIGNIN_PATH: &str = "/users/signin";

/// The full application. Page routes sit behind the session middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(users::router())
        .merge(posts::router())
        .merge(comments::router())
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        // Added after the session layer so asset requests never mint sessions.
        .route("/assets/{*path}", get(assets::serve))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Per-page data shared by every template through `base.html`.
pub struct Chrome {
    pub nickname: Option<String>,
    pub is_admin: bool,
    pub flash: Option<String>,
}

impl Chrome {
    /// Consumes the session's pending flash message.
    pub fn load(conn: &Connection, session: &Session) -> AppResult<Self> {
        Ok(Self {
            nickname: session.identity.nickname().map(str::to_owned),
            is_admin: session.identity.is_admin(),
            flash: session::take_flash(conn, &session.token)?,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.nickname.is_some()
    }
}

/// Queue `message` for the next page and redirect to `to`.
pub fn flash_redirect(
    state: &AppState,
    session: &Session,
    message: &str,
    to: &str,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    session::set_flash(
        &conn,
        &session.token,
        message,
        state.config.auth.session_hours,
    )?;
    Ok(Redirect::to(to).into_response())
}

/// Turn a domain error into a flash message and a redirect. Form errors go
/// back to `form_path`, auth failures to sign-in, missing resources to the
/// post list. Infrastructure errors propagate as a 500.
pub fn recover(
    state: &AppState,
    session: &Session,
    err: AppError,
    form_path: &str,
) -> AppResult<Response> {
    let (message, to) = match &err {
        AppError::DuplicateUser
        | AppError::InvalidCredentials
        | AppError::NoOpChange
        | AppError::Validation(_) => (err.to_string(), form_path),
        AppError::Unauthorized if session.identity.is_authenticated() => (
            "You don't have permission to do that!".to_string(),
            SIGNIN_PATH,
        ),
        AppError::Unauthorized => ("You must sign in first!".to_string(), SIGNIN_PATH),
        AppError::NotFound => ("Nothing was found at that address.".to_string(), "/"),
        _ => return Err(err),
    };

    tracing::debug!(error = %err, redirect = to, "Recovered request error");
    flash_redirect(state, session, &message, to)
}
