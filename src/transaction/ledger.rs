//! Keeps each user's balance equal to the signed sum of their transactions.
//!
//! Every function here changes transaction rows and the owner's balance in
//! one SQLite transaction, so either both changes are committed or neither is.
//! The balance is read and written while the transaction holds the write lock,
//! and a change that would take it outside the range of an `i64` is rejected.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    category::get_category,
    database_id::{CategoryId, TransactionId},
};

use super::core::{
    NewTransaction, Transaction, TransactionChanges, delete_transaction_row,
    delete_transaction_rows, get_transaction, insert_transaction_row, update_transaction_row,
};

/// Record a new transaction for `user_id` and apply it to their balance.
///
/// Returns the stored transaction and the user's new balance.
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if the amount is below zero,
/// - [Error::InvalidInput] if the new balance would overflow,
/// - [Error::CategoryNotFound] if the category does not belong to `user_id`,
/// - [Error::NotFound] if the user does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
///
/// Nothing is written when an error is returned.
pub fn create_transaction(
    user_id: UserID,
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<(Transaction, i64), Error> {
    validate_amount(new_transaction.amount)?;

    let sql_transaction = begin(connection)?;

    if let Some(category_id) = new_transaction.category_id {
        ensure_category_owned(category_id, user_id, &sql_transaction)?;
    }

    let transaction = insert_transaction_row(
        user_id,
        new_transaction,
        OffsetDateTime::now_utc(),
        &sql_transaction,
    )?;
    let balance = adjust_balance(
        user_id,
        i128::from(transaction.signed_amount()),
        &sql_transaction,
    )?;

    sql_transaction.commit()?;

    Ok((transaction, balance))
}

/// Apply `changes` to the transaction `id` owned by `user_id`.
///
/// The old transaction's contribution is taken off the balance and the new
/// one is added, in a single balance update. Returns the updated transaction
/// and the user's new balance.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidInput] if `changes` is empty or the new balance would overflow,
/// - [Error::NegativeAmount] if the new amount is below zero,
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - [Error::CategoryNotFound] if the new category does not belong to `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
///
/// Nothing is written when an error is returned.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    changes: TransactionChanges,
    connection: &Connection,
) -> Result<(Transaction, i64), Error> {
    if changes.is_empty() {
        return Err(Error::InvalidInput("no fields to update".to_owned()));
    }

    if let Some(amount) = changes.amount {
        validate_amount(amount)?;
    }

    let sql_transaction = begin(connection)?;

    let old_transaction = get_transaction(id, user_id, &sql_transaction)?;

    if let Some(category_id) = changes.category_id {
        ensure_category_owned(category_id, user_id, &sql_transaction)?;
    }

    let new_transaction = changes.apply(&old_transaction, OffsetDateTime::now_utc());
    update_transaction_row(&new_transaction, &sql_transaction)?;

    let delta =
        i128::from(new_transaction.signed_amount()) - i128::from(old_transaction.signed_amount());
    let balance = adjust_balance(user_id, delta, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok((new_transaction, balance))
}

/// Delete the transaction `id` owned by `user_id` and take its contribution
/// off their balance.
///
/// Returns the user's new balance.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - [Error::InvalidInput] if the new balance would overflow,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<i64, Error> {
    let sql_transaction = begin(connection)?;

    let transaction = get_transaction(id, user_id, &sql_transaction)?;

    if delete_transaction_row(id, user_id, &sql_transaction)? == 0 {
        return Err(Error::TransactionNotFound(id));
    }

    let balance = adjust_balance(
        user_id,
        -i128::from(transaction.signed_amount()),
        &sql_transaction,
    )?;

    sql_transaction.commit()?;

    Ok(balance)
}

/// Delete all of `user_id`'s transactions and reset their balance to zero.
///
/// Returns the number of transactions deleted and the new balance.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the user does not exist,
/// - or [Error::SqlError] if there is an SQL error.
pub fn delete_all_transactions(
    user_id: UserID,
    connection: &Connection,
) -> Result<(usize, i64), Error> {
    let sql_transaction = begin(connection)?;

    let deleted = clear_ledger(user_id, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok((deleted, 0))
}

/// Delete all of `user_id`'s transactions and set their balance to zero.
///
/// This does not start its own SQL transaction, the caller must run it
/// inside one so the deletion and the reset are committed together.
pub(crate) fn clear_ledger(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    let deleted = delete_transaction_rows(user_id, connection)?;

    let rows_affected = connection.execute(
        "UPDATE user SET balance = 0 WHERE id = ?1",
        (user_id.as_i64(),),
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(deleted),
    }
}

/// Start an SQL transaction that takes the write lock straight away.
///
/// Taking the lock up front means two ledger operations can never interleave
/// between reading a transaction and updating the balance.
fn begin(connection: &Connection) -> Result<SqlTransaction<'_>, Error> {
    SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate).map_err(Error::from)
}

/// Add `delta` to the user's balance and return the new balance.
///
/// Must be called inside a transaction started with [begin] so no other
/// writer can change the balance between the read and the write.
fn adjust_balance(user_id: UserID, delta: i128, connection: &Connection) -> Result<i64, Error> {
    let balance: i64 = connection.query_row(
        "SELECT balance FROM user WHERE id = ?1",
        (user_id.as_i64(),),
        |row| row.get(0),
    )?;

    let new_balance = i64::try_from(i128::from(balance) + delta)
        .map_err(|_| Error::InvalidInput("the balance would overflow".to_owned()))?;

    connection
        .query_row(
            "UPDATE user SET balance = ?1 WHERE id = ?2 RETURNING balance",
            (new_balance, user_id.as_i64()),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

fn validate_amount(amount: i64) -> Result<(), Error> {
    if amount < 0 {
        Err(Error::NegativeAmount)
    } else {
        Ok(())
    }
}

fn ensure_category_owned(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    get_category(category_id, user_id, connection).map(|_| ())
}
