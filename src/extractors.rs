use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::session::{self, Session};
use crate::error::AppError;
use crate::state::AppState;

// -- Cookie helpers --

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    let prefix = format!("{}=", name);
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Middleware that resolves the session cookie before any handler runs.
/// Unknown or expired tokens get an in-memory anonymous session. Its cookie
/// is sent only once the handler has stored it (a flash message) and did not
/// issue a cookie of its own.
pub async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = &state.config.auth;

    // The connection goes back to the pool before the handler runs.
    let session = {
        let conn = state.db.get()?;
        match cookie_value(req.headers(), &auth.cookie_name) {
            Some(token) => session::load(&conn, token)?,
            None => None,
        }
    }
    .unwrap_or_else(session::anonymous);

    let unsaved_token = session.is_new.then(|| session.token.clone());
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;

    if let Some(token) = unsaved_token {
        if !sets_cookie(response.headers(), &auth.cookie_name) {
            let conn = state.db.get()?;
            if session::exists(&conn, &token)? {
                let cookie = session_cookie(&auth.cookie_name, &token, auth.session_hours);
                let value = HeaderValue::from_str(&cookie)
                    .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))?;
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }

    Ok(response)
}

/// The request's session as resolved by `session_layer`.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; scribe_session=abc123; other=1"),
        );
        assert_eq!(cookie_value(&headers, "scribe_session"), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn session_cookie_is_http_only_and_strict() {
        let cookie = session_cookie("scribe_session", "tok", 2);
        assert!(cookie.starts_with("scribe_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=7200"));
    }

    #[test]
    fn sets_cookie_matches_by_name() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_static("scribe_session=new; Path=/"),
        );
        assert!(sets_cookie(&headers, "scribe_session"));
        assert!(!sets_cookie(&headers, "scribe"));
    }
}
