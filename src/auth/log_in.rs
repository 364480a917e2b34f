//! This file defines the routes for logging in and for exchanging a refresh token for a new access token.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserID,
    auth::{
        refresh_token::{get_refresh_token_id, save_refresh_token_id},
        token::{TokenKind, TokenService},
    },
    user::{get_user_by_email, get_user_by_id},
};

/// The state needed to log in and refresh tokens.
#[derive(Clone)]
pub struct LoginState {
    /// Issues and verifies tokens.
    pub token_service: TokenService,
    /// The database connection for looking up users and their refresh tokens.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_service: state.token_service.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for a log-in request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// The tokens handed out after a successful log-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogInResponse {
    /// The ID of the user that logged in.
    pub id: UserID,
    /// A short-lived token to send with API requests.
    pub access_token: String,
    /// A long-lived token that can be exchanged for a new access token.
    pub refresh_token: String,
}

/// Handler for log-in requests.
///
/// On success, responds with an access token and a refresh token. The
/// refresh token replaces any refresh token issued to the user before.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email does not belong to a registered user or the password is not
///   correct, both give [Error::InvalidCredentials].
/// - An internal error occurred when signing the tokens or accessing the database.
pub async fn post_log_in(
    State(state): State<LoginState>,
    Json(user_data): Json<LogInData>,
) -> Result<Json<LogInResponse>, Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(user_data.email.trim(), &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    if !user.password_hash.verify(&user_data.password) {
        tracing::info!("Failed log-in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let access_token = state.token_service.issue_access_token(user.id)?;
    let refresh_claims = state.token_service.refresh_token_claims(user.id);
    let refresh_token = state.token_service.encode(&refresh_claims)?;

    {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;
        save_refresh_token_id(user.id, &refresh_claims.jti, &connection)?;
    }

    tracing::info!("User {} logged in", user.id);

    Ok(Json(LogInResponse {
        id: user.id,
        access_token,
        refresh_token,
    }))
}

/// The data for a token refresh request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshData {
    /// The refresh token handed out at log-in.
    pub refresh_token: String,
}

/// The new access token handed out after a successful refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// The ID of the user the token was issued to.
    pub id: UserID,
    /// A new short-lived token to send with API requests.
    pub access_token: String,
}

/// Handler for exchanging a refresh token for a new access token.
///
/// # Errors
///
/// This function will return an:
/// - [Error::ExpiredToken] or [Error::InvalidToken] if the token cannot be verified,
/// - [Error::WrongTokenType] if an access token was sent instead of a refresh token,
/// - [Error::Unauthenticated] if the user no longer exists,
/// - [Error::InvalidToken] if a newer refresh token has been issued to the user since.
pub async fn post_refresh(
    State(state): State<LoginState>,
    Json(data): Json<RefreshData>,
) -> Result<Json<RefreshResponse>, Error> {
    let claims = state.token_service.decode(&data.refresh_token)?;

    if claims.kind() != TokenKind::Refresh {
        return Err(Error::WrongTokenType);
    }

    let user_id = claims.user_id()?;

    {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_id(user_id, &connection) {
            Ok(_) => {}
            Err(Error::NotFound) => return Err(Error::Unauthenticated),
            Err(error) => return Err(error),
        }

        if get_refresh_token_id(user_id, &connection)?.as_deref() != Some(claims.jti.as_str()) {
            tracing::info!("Rejected superseded refresh token for user {user_id}");
            return Err(Error::InvalidToken);
        }
    }

    let access_token = state.token_service.issue_access_token(user_id)?;

    Ok(Json(RefreshResponse {
        id: user_id,
        access_token,
    }))
}
