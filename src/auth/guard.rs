//! The check that protected route handlers use to get the calling user.

use axum::{
    extract::FromRequestParts,
    http::{Extensions, request::Parts},
};

use crate::{Error, User, auth::middleware::Identity};

/// Get the user attached to a request by [crate::auth::resolve_identity].
///
/// # Errors
///
/// Returns [Error::Unauthenticated] if the request is anonymous or the
/// middleware did not run for this route.
pub fn require_identity(extensions: &Extensions) -> Result<User, Error> {
    match extensions.get::<Identity>() {
        Some(Identity(Some(user))) => Ok(user.clone()),
        _ => Err(Error::Unauthenticated),
    }
}

/// Extractor for the authenticated user making the request.
///
/// Rejects the request with 401 Unauthorized if there is no authenticated user.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_identity(&parts.extensions).map(CurrentUser)
    }
}
