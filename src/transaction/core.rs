//! Defines the core data models and database queries for transactions.
//!
//! The functions that write transaction rows are crate private, since every
//! write must be paired with a balance update. Use the functions in
//! [super::ledger] to change transactions.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    Error, UserID,
    database_id::{CategoryId, TransactionId},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money earned, adds to the balance.
    Income,
    /// Money spent, subtracts from the balance.
    Expense,
}

impl TransactionType {
    /// The contribution of a transaction of this type with `amount` to a balance.
    pub fn signed_amount(self, amount: i64) -> i64 {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The amount of money in the smallest currency unit, never negative.
    pub amount: i64,
    /// A free text note about the transaction.
    pub note: Option<String>,
    /// The ID of the category the transaction belongs to.
    pub category_id: Option<CategoryId>,
    /// When the transaction happened.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// The user that owns the transaction. Never changes after creation.
    pub user_id: UserID,
}

impl Transaction {
    /// The contribution of this transaction to its owner's balance.
    pub fn signed_amount(&self) -> i64 {
        self.kind.signed_amount(self.amount)
    }
}

/// The data needed to record a new transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The amount of money in the smallest currency unit.
    pub amount: i64,
    /// A free text note about the transaction.
    #[serde(default)]
    pub note: Option<String>,
    /// The category to file the transaction under.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// When the transaction happened, defaults to when it is recorded.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl NewTransaction {
    /// Create a new transaction with no note, category or date.
    pub fn new(kind: TransactionType, amount: i64) -> Self {
        Self {
            kind,
            amount,
            note: None,
            category_id: None,
            date: None,
        }
    }

    /// Set the category for the transaction.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the note for the transaction.
    pub fn note(mut self, note: Option<&str>) -> Self {
        self.note = note.map(str::to_owned);
        self
    }

    /// Set the date the transaction happened.
    pub fn date(mut self, date: OffsetDateTime) -> Self {
        self.date = Some(date);
        self
    }
}

/// A partial update to a transaction. Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionChanges {
    /// The new transaction type.
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionType>,
    /// The new amount.
    #[serde(default)]
    pub amount: Option<i64>,
    /// The new note.
    #[serde(default)]
    pub note: Option<String>,
    /// The new category.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// The new date.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

impl TransactionChanges {
    /// Whether the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.amount.is_none()
            && self.note.is_none()
            && self.category_id.is_none()
            && self.date.is_none()
    }

    /// The transaction that results from applying these changes to `transaction` at `now`.
    pub(crate) fn apply(self, transaction: &Transaction, now: OffsetDateTime) -> Transaction {
        Transaction {
            id: transaction.id,
            kind: self.kind.unwrap_or(transaction.kind),
            amount: self.amount.unwrap_or(transaction.amount),
            note: self.note.or_else(|| transaction.note.clone()),
            category_id: self.category_id.or(transaction.category_id),
            date: self.date.map(to_utc).unwrap_or(transaction.date),
            created_at: transaction.created_at,
            updated_at: now,
            user_id: transaction.user_id,
        }
    }
}

pub(crate) fn to_utc(date_time: OffsetDateTime) -> OffsetDateTime {
    date_time.to_offset(UtcOffset::UTC)
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str =
    "id, kind, amount, note, category_id, date, created_at, updated_at, user_id";

/// Retrieve the transaction with `id` that belongs to `user_id`.
///
/// Transactions owned by other users are treated as missing.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound(id),
            error => error.into(),
        })
}

/// Retrieve all of a user's transactions, most recent first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_transactions(user_id: UserID, connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE user_id = ?1
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((user_id.as_i64(),), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Retrieve a user's transactions in the category `category_id`, most recent first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn get_transactions_by_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE category_id = ?1 AND user_id = ?2
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((category_id, user_id.as_i64()), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Insert a transaction row for `user_id`.
///
/// The date defaults to `now` when `new_transaction` has none. The caller
/// must apply the matching balance change in the same SQL transaction.
pub(crate) fn insert_transaction_row(
    user_id: UserID,
    new_transaction: &NewTransaction,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let date = new_transaction.date.map(to_utc).unwrap_or(now);

    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (kind, amount, note, category_id, date, created_at, updated_at, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                new_transaction.kind,
                new_transaction.amount,
                &new_transaction.note,
                new_transaction.category_id,
                date,
                now,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Overwrite the stored row for `transaction`, except for its owner.
///
/// The caller must apply the matching balance change in the same SQL transaction.
pub(crate) fn update_transaction_row(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\"
        SET \
            kind = ?1, \
            amount = ?2, \
            note = ?3, \
            category_id = ?4, \
            date = ?5, \
            updated_at = ?6 \
        WHERE id = ?7 AND user_id = ?8;",
        (
            transaction.kind,
            transaction.amount,
            &transaction.note,
            transaction.category_id,
            transaction.date,
            transaction.updated_at,
            transaction.id,
            transaction.user_id.as_i64(),
        ),
    )?;

    match rows_affected {
        0 => Err(Error::TransactionNotFound(transaction.id)),
        _ => Ok(()),
    }
}

type RowsAffected = usize;

/// Delete the transaction row with `id` owned by `user_id`.
///
/// The caller must apply the matching balance change in the same SQL transaction.
pub(crate) fn delete_transaction_row(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
            (id, user_id.as_i64()),
        )
        .map_err(Error::from)
}

/// Delete every transaction row owned by `user_id`.
///
/// The caller must reset the balance in the same SQL transaction.
pub(crate) fn delete_transaction_rows(
    user_id: UserID,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "DELETE FROM \"transaction\" WHERE user_id = ?1",
            (user_id.as_i64(),),
        )
        .map_err(Error::from)
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                amount INTEGER NOT NULL CHECK (amount >= 0),
                note TEXT,
                category_id INTEGER,
                date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let kind = row.get(1)?;
    let amount = row.get(2)?;
    let note = row.get(3)?;
    let category_id = row.get(4)?;
    let date = row.get(5)?;
    let created_at = row.get(6)?;
    let updated_at = row.get(7)?;
    let raw_user_id = row.get(8)?;

    Ok(Transaction {
        id,
        kind,
        amount,
        note,
        category_id,
        date,
        created_at,
        updated_at,
        user_id: UserID::new(raw_user_id),
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::{OffsetDateTime, macros::datetime};

    use crate::{Error, PasswordHash, User, db::initialize, user::create_user};

    use super::{
        NewTransaction, TransactionType, get_transaction, get_transactions,
        insert_transaction_row,
    };

    fn get_test_connection() -> (Connection, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Foo", "foo@bar.baz", PasswordHash::new_unchecked("x"), &conn)
            .unwrap();
        (conn, user)
    }

    #[test]
    fn insert_defaults_date_to_now() {
        let (conn, user) = get_test_connection();
        let now = datetime!(2025-10-05 10:00:00 UTC);

        let transaction = insert_transaction_row(
            user.id,
            &NewTransaction::new(TransactionType::Income, 12),
            now,
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.date, now);
        assert_eq!(transaction.created_at, now);
        assert_eq!(transaction.updated_at, now);
        assert_eq!(transaction.user_id, user.id);
    }

    #[test]
    fn get_transaction_round_trips_row() {
        let (conn, user) = get_test_connection();
        let inserted = insert_transaction_row(
            user.id,
            &NewTransaction::new(TransactionType::Expense, 42).note(Some("lunch")),
            OffsetDateTime::now_utc(),
            &conn,
        )
        .unwrap();

        let got = get_transaction(inserted.id, user.id, &conn).unwrap();

        assert_eq!(got, inserted);
    }

    #[test]
    fn get_transaction_hides_other_users_transactions() {
        let (conn, user) = get_test_connection();
        let other = create_user("Bar", "bar@bar.baz", PasswordHash::new_unchecked("y"), &conn)
            .unwrap();
        let inserted = insert_transaction_row(
            user.id,
            &NewTransaction::new(TransactionType::Expense, 42),
            OffsetDateTime::now_utc(),
            &conn,
        )
        .unwrap();

        let result = get_transaction(inserted.id, other.id, &conn);

        assert_eq!(result, Err(Error::TransactionNotFound(inserted.id)));
    }

    #[test]
    fn get_transactions_returns_most_recent_first() {
        let (conn, user) = get_test_connection();
        let now = OffsetDateTime::now_utc();
        let older = insert_transaction_row(
            user.id,
            &NewTransaction::new(TransactionType::Income, 1).date(datetime!(2025-01-01 00:00 UTC)),
            now,
            &conn,
        )
        .unwrap();
        let newer = insert_transaction_row(
            user.id,
            &NewTransaction::new(TransactionType::Income, 2).date(datetime!(2025-06-01 00:00 UTC)),
            now,
            &conn,
        )
        .unwrap();

        let got = get_transactions(user.id, &conn).unwrap();

        assert_eq!(got, vec![newer, older]);
    }

    #[test]
    fn table_rejects_negative_amount() {
        let (conn, user) = get_test_connection();

        let result = insert_transaction_row(
            user.id,
            &NewTransaction::new(TransactionType::Income, -1),
            OffsetDateTime::now_utc(),
            &conn,
        );

        assert!(matches!(result, Err(Error::SqlError(_))));
    }
}
