//! Read-only route handlers for the caller's transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;

use crate::{AppState, Error, auth::CurrentUser, database_id::TransactionId};

use super::{Transaction, get_transaction, get_transactions};

/// The state needed to view transactions.
#[derive(Debug, Clone)]
pub struct ViewTransactionState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ViewTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for listing the caller's transactions, most recent first.
pub async fn get_transactions_endpoint(
    State(state): State<ViewTransactionState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_transactions(user.id, &connection).map(Json)
}

/// A route handler for getting one of the caller's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<ViewTransactionState>,
    CurrentUser(user): CurrentUser,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_transaction(transaction_id, user.id, &connection).map(Json)
}
