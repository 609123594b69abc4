//! Posts, comments and likes. Every operation takes the caller's `Identity`,
//! checks the matching predicate in `auth::policy`, and performs its writes in
//! a single transaction.

pub mod comments;
pub mod likes;
pub mod posts;

use crate::error::{AppError, AppResult};

pub const TITLE_MAX: usize = 50;
pub const TEXT_MAX: usize = 500;
pub const COMMENT_MAX: usize = 200;

/// Trim `value` and check it is non-empty and at most `max` characters.
fn bounded<'a>(field: &str, value: &'a str, max: usize) -> AppResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty.")));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters."
        )));
    }
    Ok(value)
}
