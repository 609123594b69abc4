use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("User with this nickname already exists!")]
    DuplicateUser,

    #[error("Wrong nickname or password!")]
    InvalidCredentials,

    #[error("The new password must differ from the old one!")]
    NoOpChange,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Domain errors are surfaced to the user as a flash message; the rest
    /// are infrastructure failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            AppError::DuplicateUser
                | AppError::InvalidCredentials
                | AppError::NoOpChange
                | AppError::Unauthorized
                | AppError::NotFound
                | AppError::Validation(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DuplicateUser => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NoOpChange | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Hash(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_domain() {
            self.to_string()
        } else {
            tracing::error!("{}", self);
            "Internal server error".to_string()
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
