use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::Session;
use crate::content::posts;
use crate::db::models::Post;
use crate::error::AppResult;
use crate::routes::Chrome;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub posts: Vec<Post>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// GET /: every post, newest first
pub async fn index(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = posts::list_posts(&conn)?;
    let chrome = Chrome::load(&conn, &session)?;

    Ok(Html(HomeTemplate { chrome, posts }).into_response())
}
