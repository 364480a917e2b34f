use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{AppState, Error, auth::CurrentUser, database_id::TransactionId};

use super::ledger::{delete_all_transactions, delete_transaction};

/// The state needed to delete transactions.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for deleting one of the caller's transactions, responds with the updated balance.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    CurrentUser(user): CurrentUser,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let balance = delete_transaction(transaction_id, user.id, &connection)?;

    Ok(Json(json!({ "message": "Transaction deleted", "balance": balance })).into_response())
}

/// A route handler for deleting all of the caller's transactions.
///
/// Responds with the number of deleted transactions and the balance, which is always zero.
pub async fn delete_all_transactions_endpoint(
    State(state): State<DeleteTransactionState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let (deleted, balance) = delete_all_transactions(user.id, &connection)?;
    tracing::info!("User {} deleted all {deleted} of their transactions", user.id);

    Ok(Json(json!({
        "message": "All transactions deleted",
        "deleted": deleted,
        "balance": balance,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::to_bytes,
        extract::{Path, State},
    };
    use rusqlite::Connection;
    use serde_json::Value;

    use crate::{
        Error, PasswordHash, User,
        auth::CurrentUser,
        initialize_db,
        transaction::{NewTransaction, TransactionType, create_transaction, get_transaction},
        user::create_user,
    };

    use super::{
        DeleteTransactionState, delete_all_transactions_endpoint, delete_transaction_endpoint,
    };

    fn must_create_test_state() -> (DeleteTransactionState, User) {
        let connection = Connection::open_in_memory().unwrap();
        initialize_db(&connection).unwrap();
        let user = create_user(
            "Foo",
            "foo@bar.baz",
            PasswordHash::new_unchecked("x"),
            &connection,
        )
        .unwrap();

        (
            DeleteTransactionState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user,
        )
    }

    #[tokio::test]
    async fn deletes_transaction_and_reverses_balance() {
        let (state, user) = must_create_test_state();
        let (transaction, _) = create_transaction(
            user.id,
            &NewTransaction::new(TransactionType::Expense, 75),
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();

        let response = delete_transaction_endpoint(
            State(state.clone()),
            CurrentUser(user.clone()),
            Path(transaction.id),
        )
        .await
        .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["balance"], 0);
        assert_eq!(
            get_transaction(transaction.id, user.id, &state.db_connection.lock().unwrap()),
            Err(Error::TransactionNotFound(transaction.id))
        );
    }

    #[tokio::test]
    async fn delete_all_reports_count() {
        let (state, user) = must_create_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            for amount in [10, 20, 30] {
                create_transaction(
                    user.id,
                    &NewTransaction::new(TransactionType::Income, amount),
                    &connection,
                )
                .unwrap();
            }
        }

        let response = delete_all_transactions_endpoint(State(state), CurrentUser(user))
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["deleted"], 3);
        assert_eq!(body["balance"], 0);
    }
}
