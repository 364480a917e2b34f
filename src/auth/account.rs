//! Routes for the authenticated user's own account.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState, Error, PasswordHash, User, ValidatedPassword, auth::CurrentUser,
    user::update_password,
};

/// The state needed to manage the caller's account.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for updating users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Handler that responds with the caller's account, including their balance.
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// The data for a change password request.
#[derive(Serialize, Deserialize)]
pub struct ChangePasswordData {
    /// The caller's password before the change.
    pub current_password: String,
    /// The password to change to.
    pub new_password: String,
}

/// Handler for changing the caller's password.
///
/// # Errors
///
/// This function will return an:
/// - [Error::InvalidCredentials] if the current password is wrong,
/// - [Error::TooWeak] if the new password is too easy to guess,
/// - or an internal error if hashing the password or updating the user failed.
pub async fn change_password(
    State(state): State<AccountState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<ChangePasswordData>,
) -> Result<Response, Error> {
    if !user.password_hash.verify(&data.current_password) {
        return Err(Error::InvalidCredentials);
    }

    let password_hash = PasswordHash::new(ValidatedPassword::new(&data.new_password)?)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_password(user.id, &password_hash, &connection)?;
    tracing::info!("User {} changed their password", user.id);

    Ok(Json(json!({ "message": "Password updated" })).into_response())
}

#[cfg(test)]
mod change_password_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, extract::State};
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash, User,
        auth::CurrentUser,
        initialize_db,
        user::{create_user, get_user_by_id},
    };

    use super::{AccountState, ChangePasswordData, change_password};

    const OLD_PASSWORD: &str = "foobarbazquxgobbledygook";
    const NEW_PASSWORD: &str = "correcthorsebatterystaple42";

    fn must_create_test_state() -> (AccountState, User) {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = create_user(
            "Foo",
            "foo@bar.baz",
            PasswordHash::from_raw_password(OLD_PASSWORD).unwrap(),
            &connection,
        )
        .unwrap();

        (
            AccountState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user,
        )
    }

    #[tokio::test]
    async fn changes_password() {
        let (state, user) = must_create_test_state();

        change_password(
            State(state.clone()),
            CurrentUser(user.clone()),
            Json(ChangePasswordData {
                current_password: OLD_PASSWORD.to_owned(),
                new_password: NEW_PASSWORD.to_owned(),
            }),
        )
        .await
        .unwrap();

        let stored = get_user_by_id(user.id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(stored.password_hash.verify(NEW_PASSWORD));
        assert!(!stored.password_hash.verify(OLD_PASSWORD));
    }

    #[tokio::test]
    async fn rejects_wrong_current_password() {
        let (state, user) = must_create_test_state();

        let result = change_password(
            State(state.clone()),
            CurrentUser(user.clone()),
            Json(ChangePasswordData {
                current_password: "wrongpassword".to_owned(),
                new_password: NEW_PASSWORD.to_owned(),
            }),
        )
        .await;

        assert_eq!(result.err(), Some(Error::InvalidCredentials));
        let stored = get_user_by_id(user.id, &state.db_connection.lock().unwrap()).unwrap();
        assert!(stored.password_hash.verify(OLD_PASSWORD));
    }

    #[tokio::test]
    async fn rejects_weak_new_password() {
        let (state, user) = must_create_test_state();

        let result = change_password(
            State(state),
            CurrentUser(user),
            Json(ChangePasswordData {
                current_password: OLD_PASSWORD.to_owned(),
                new_password: "password".to_owned(),
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }
}
