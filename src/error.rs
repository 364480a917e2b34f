//! Defines the app level error type and its conversion to JSON error responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::database_id::{CategoryId, TransactionId};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password did not match a registered user.
    ///
    /// An unknown email and a wrong password both produce this error so that
    /// clients cannot probe which emails have accounts.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The bearer token has a bad signature, is malformed, or was signed
    /// with an algorithm other than the configured one.
    #[error("invalid token")]
    InvalidToken,

    /// The bearer token was well formed but its expiry time has passed.
    #[error("token has expired")]
    ExpiredToken,

    /// An access token was used where a refresh token is required.
    #[error("invalid token type")]
    WrongTokenType,

    /// The request needs an authenticated user but none was attached.
    #[error("not authenticated")]
    Unauthenticated,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// A required field was empty or otherwise malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A transaction amount was below zero.
    #[error("amount cannot be negative")]
    NegativeAmount,

    /// The category does not exist or belongs to another user.
    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// The transaction does not exist or belongs to another user.
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A token could not be signed.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// The server was started with configuration that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials
            | Error::InvalidToken
            | Error::ExpiredToken
            | Error::WrongTokenType
            | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::TooWeak(_) | Error::InvalidInput(_) | Error::NegativeAmount => {
                StatusCode::BAD_REQUEST
            }
            Error::CategoryNotFound(_) | Error::TransactionNotFound(_) | Error::NotFound => {
                StatusCode::NOT_FOUND
            }
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::InvalidConfig(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are for the server logs only.
            tracing::error!("An unexpected error occurred: {}", self);
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use serde_json::Value;

    use super::Error;

    async fn response_parts(error: Error) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn auth_errors_are_unauthorized() {
        for error in [
            Error::InvalidCredentials,
            Error::InvalidToken,
            Error::ExpiredToken,
            Error::WrongTokenType,
            Error::Unauthenticated,
        ] {
            let (status, _) = response_parts(error).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn not_found_errors_name_the_resource() {
        let (status, body) = response_parts(Error::CategoryNotFound(3)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "category 3 not found");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) =
            response_parts(Error::HashingError("salt exploded".to_owned())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }
}
