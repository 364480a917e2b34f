//! The route for registering a new user account.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, PasswordHash, User, ValidatedPassword, user::create_user};

/// The state needed to register a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for creating users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data for a registration request.
#[derive(Serialize, Deserialize)]
pub struct RegisterData {
    /// The name shown to the user.
    pub name: String,
    /// The email the user will log in with.
    pub email: String,
    /// The password the user will log in with.
    pub password: String,
}

/// Handler for registering a new user, responds with the created user.
///
/// New users start with a balance of zero.
///
/// # Errors
///
/// This function will return an:
/// - [Error::InvalidInput] if the name is empty or the email is not a valid address,
/// - [Error::TooWeak] if the password is too easy to guess,
/// - or an internal error if hashing the password or inserting the user failed.
pub async fn register_user(
    State(state): State<RegistrationState>,
    Json(user_data): Json<RegisterData>,
) -> Result<Json<User>, Error> {
    let name = user_data.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_owned()));
    }

    let email = user_data.email.trim();
    if !EmailAddress::is_valid(email) {
        return Err(Error::InvalidInput(format!("\"{email}\" is not a valid email address")));
    }

    let validated_password = ValidatedPassword::new(&user_data.password)?;
    let password_hash = PasswordHash::new(validated_password).inspect_err(|error| {
        tracing::error!("an error occurred while hashing a password: {error}");
    })?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = create_user(name, email, password_hash, &connection)?;
    tracing::info!("Registered user {}", user.id);

    Ok(Json(user))
}

#[cfg(test)]
mod register_user_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{initialize_db, user::get_user_by_email};

    use super::{RegistrationState, register_user};

    fn get_test_server() -> (TestServer, RegistrationState) {
        let connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        initialize_db(&connection).expect("Could not initialize database.");
        let state = RegistrationState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route("/register", post(register_user))
            .with_state(state.clone());

        (
            TestServer::new(app).expect("Could not create test server."),
            state,
        )
    }

    #[tokio::test]
    async fn register_creates_user_with_zero_balance() {
        let (server, state) = get_test_server();

        let response = server
            .post("/register")
            .json(&json!({
                "name": "Foo",
                "email": "foo@bar.baz",
                "password": "foobarbazquxgobbledygook",
            }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["name"], "Foo");
        assert_eq!(body["email"], "foo@bar.baz");
        assert_eq!(body["balance"], 0);
        assert!(body.get("password_hash").is_none());

        let user = get_user_by_email("foo@bar.baz", &state.db_connection.lock().unwrap()).unwrap();
        assert!(user.password_hash.verify("foobarbazquxgobbledygook"));
    }

    #[tokio::test]
    async fn register_fails_with_weak_password() {
        let (server, _) = get_test_server();

        let response = server
            .post("/register")
            .json(&json!({ "name": "Foo", "email": "foo@bar.baz", "password": "imtooshort" }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn register_fails_with_invalid_email() {
        let (server, _) = get_test_server();

        let response = server
            .post("/register")
            .json(&json!({
                "name": "Foo",
                "email": "not an email",
                "password": "foobarbazquxgobbledygook",
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn register_fails_with_empty_name() {
        let (server, _) = get_test_server();

        let response = server
            .post("/register")
            .json(&json!({
                "name": "   ",
                "email": "foo@bar.baz",
                "password": "foobarbazquxgobbledygook",
            }))
            .await;

        response.assert_status_bad_request();
        assert_eq!(
            response.json::<Value>()["error"],
            "invalid input: name cannot be empty"
        );
    }
}
