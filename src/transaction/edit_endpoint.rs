use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{AppState, Error, auth::CurrentUser, database_id::TransactionId};

use super::{TransactionChanges, ledger::update_transaction};

/// The state needed to edit a transaction.
#[derive(Debug, Clone)]
pub struct EditTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for partially updating one of the caller's transactions.
///
/// Responds with the updated transaction and the caller's updated balance.
pub async fn edit_transaction_endpoint(
    State(state): State<EditTransactionState>,
    CurrentUser(user): CurrentUser,
    Path(transaction_id): Path<TransactionId>,
    Json(changes): Json<TransactionChanges>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let (transaction, balance) =
        update_transaction(transaction_id, user.id, changes, &connection)?;

    Ok(Json(json!({ "transaction": transaction, "balance": balance })).into_response())
}
