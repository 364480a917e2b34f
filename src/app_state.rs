//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, TokenConfig, auth::TokenService, db::initialize};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// Signs and verifies access and refresh tokens.
    pub token_service: TokenService,

    /// The database connection.
    ///
    /// Holding the lock serializes all reads and writes, which is what keeps
    /// concurrent balance updates for the same user from overwriting each other.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, token_config: &TokenConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            token_service: TokenService::new(token_config),
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}
