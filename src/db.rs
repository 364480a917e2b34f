//! Sets up the application database.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, auth::create_refresh_token_table, category::create_category_table,
    transaction::create_transaction_table, user::create_user_table,
};

/// Create the all of the database tables for the application.
///
/// Foreign key enforcement is switched on for `connection` first, the
/// category ownership and cascade rules depend on it.
///
/// # Errors
/// This function may return a [Error::SqlError] if there was an error creating the tables.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // The pragma is a no-op inside a transaction, so it must come first.
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_refresh_token_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
