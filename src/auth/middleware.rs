//! Authentication middleware that resolves the bearer token on a request to a user.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use rusqlite::Connection;

use crate::{
    AppState, Error, User,
    auth::token::{TokenKind, TokenService},
    user::get_user_by_id,
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// Verifies the bearer tokens.
    pub token_service: TokenService,
    /// The database connection for looking up the token's user.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_service: state.token_service.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The user a request was made by, or `None` for anonymous requests.
///
/// Inserted into the request extensions by [resolve_identity] and not changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(pub Option<User>);

/// Middleware function that attaches an [Identity] to every request.
///
/// Requests without a bearer token continue anonymously. Requests with a
/// bearer token that is invalid, expired, not an access token, or that names
/// a user that cannot be loaded are rejected with 401 Unauthorized before the
/// route handler runs.
///
/// **Note**: Route handlers should use [crate::auth::CurrentUser] or
/// [crate::auth::require_identity] rather than reading the [Identity] directly.
pub async fn resolve_identity(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match authenticate(&state, request.headers()) {
        Ok(identity) => identity,
        Err(error) => return error.into_response(),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<Identity, Error> {
    let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() else {
        return Ok(Identity(None));
    };

    let claims = state.token_service.decode(bearer.token())?;

    if claims.kind() != TokenKind::Access {
        return Err(Error::WrongTokenType);
    }

    let user_id = claims.user_id()?;

    // The lock guard must not outlive the lookup, the handler needs the connection.
    let lookup = match state.db_connection.lock() {
        Ok(connection) => get_user_by_id(user_id, &connection),
        Err(_) => Err(Error::DatabaseLockError),
    };

    match lookup {
        Ok(user) => Ok(Identity(Some(user))),
        Err(error) => {
            tracing::warn!("Could not load user {user_id} for bearer token: {error}");
            Err(Error::Unauthenticated)
        }
    }
}
