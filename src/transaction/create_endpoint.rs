use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{AppState, Error, auth::CurrentUser};

use super::{NewTransaction, ledger::create_transaction};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for recording a new transaction for the caller.
///
/// Responds with 201 Created, the new transaction and the caller's updated balance.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    CurrentUser(user): CurrentUser,
    Json(new_transaction): Json<NewTransaction>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let (transaction, balance) = create_transaction(user.id, &new_transaction, &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "transaction": transaction, "balance": balance })),
    )
        .into_response())
}
