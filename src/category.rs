//! This file defines the `Category` type, the database functions for categories and the API routes for the category type.
//! A category groups a user's transactions, a transaction may only have one category.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    AppState, Error, UserID,
    auth::CurrentUser,
    database_id::CategoryId,
    transaction::{clear_ledger, get_transactions_by_category},
};

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// Leading and trailing whitespace is removed.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidInput] if `name` is empty or only whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::InvalidInput("category name cannot be empty".to_owned()))
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-owned label for grouping transactions, e.g. 'Groceries' or 'Salary'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category.
    pub name: CategoryName,
    /// A display colour chosen by the client.
    pub color: Option<String>,
    /// An icon name chosen by the client.
    pub icon: Option<String>,
    /// The user that owns the category.
    pub user_id: UserID,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the category table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                color TEXT,
                icon TEXT,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Create a category owned by `user_id`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the user does not exist or there is some other SQL error.
pub fn create_category(
    user_id: UserID,
    name: CategoryName,
    color: Option<&str>,
    icon: Option<&str>,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "INSERT INTO category (name, color, icon, user_id) VALUES (?1, ?2, ?3, ?4)
             RETURNING id, name, color, icon, user_id",
        )?
        .query_row(
            (name.as_ref(), color, icon, user_id.as_i64()),
            map_category_row,
        )
        .map_err(Error::from)
}

/// Retrieve the category `id` owned by `user_id`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::CategoryNotFound] if `id` does not refer to a category owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(
    id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, name, color, icon, user_id FROM category WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((id, user_id.as_i64()), map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(id),
            error => error.into(),
        })
}

/// Retrieve all of the categories owned by `user_id`.
///
/// # Errors
///
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, color, icon, user_id FROM category WHERE user_id = ?1 ORDER BY id")?
        .query_map((user_id.as_i64(),), map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// The fields of a category to change. Fields that are `None` are left as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryChanges {
    /// The new name of the category.
    #[serde(default)]
    pub name: Option<String>,
    /// The new display colour.
    #[serde(default)]
    pub color: Option<String>,
    /// The new icon name.
    #[serde(default)]
    pub icon: Option<String>,
}

impl CategoryChanges {
    /// Whether there are no fields to change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none() && self.icon.is_none()
    }

    fn check_not_blank(&self) -> Result<(), Error> {
        let fields = [
            ("name", &self.name),
            ("color", &self.color),
            ("icon", &self.icon),
        ];

        for (field, value) in fields {
            if value.as_deref().is_some_and(|value| value.trim().is_empty()) {
                return Err(Error::InvalidInput(format!("{field} cannot be empty")));
            }
        }

        Ok(())
    }
}

/// Apply `changes` to the category `id` owned by `user_id` and return the updated category.
///
/// # Errors
///
/// This function will return a:
/// - [Error::CategoryNotFound] if `id` does not refer to a category owned by `user_id`,
/// - [Error::InvalidInput] if `changes` is empty or sets a field to a blank string,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_category(
    id: CategoryId,
    user_id: UserID,
    changes: CategoryChanges,
    connection: &Connection,
) -> Result<Category, Error> {
    get_category(id, user_id, connection)?;

    if changes.is_empty() {
        return Err(Error::InvalidInput("no fields to update".to_owned()));
    }

    changes.check_not_blank()?;
    let name = changes
        .name
        .as_deref()
        .map(CategoryName::new)
        .transpose()?
        .map(|name| name.to_string());

    connection
        .prepare(
            "UPDATE category SET
                name = COALESCE(?1, name),
                color = COALESCE(?2, color),
                icon = COALESCE(?3, icon)
             WHERE id = ?4 AND user_id = ?5
             RETURNING id, name, color, icon, user_id",
        )?
        .query_row(
            (
                name.as_deref(),
                changes.color.as_deref(),
                changes.icon.as_deref(),
                id,
                user_id.as_i64(),
            ),
            map_category_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(id),
            error => error.into(),
        })
}

/// Delete the category `id` owned by `user_id`.
///
/// Transactions in the category are kept and become uncategorised, so the
/// balance does not change.
///
/// # Errors
///
/// This function will return a:
/// - [Error::CategoryNotFound] if `id` does not refer to a category owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(
    id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    match rows_affected {
        0 => Err(Error::CategoryNotFound(id)),
        _ => Ok(()),
    }
}

/// Delete all of the categories owned by `user_id` together with all of
/// their transactions, resetting their balance to zero.
///
/// Returns the number of categories and transactions deleted.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if the user does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_all_categories(
    user_id: UserID,
    connection: &Connection,
) -> Result<(usize, usize), Error> {
    let sql_transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let deleted_transactions = clear_ledger(user_id, &sql_transaction)?;
    let deleted_categories = sql_transaction.execute(
        "DELETE FROM category WHERE user_id = ?1",
        (user_id.as_i64(),),
    )?;

    sql_transaction.commit()?;

    Ok((deleted_categories, deleted_transactions))
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let color = row.get(2)?;
    let icon = row.get(3)?;
    let raw_user_id = row.get(4)?;

    Ok(Category {
        id,
        name: CategoryName::new_unchecked(&raw_name),
        color,
        icon,
        user_id: UserID::new(raw_user_id),
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed by the category route handlers.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a category.
#[derive(Debug, Deserialize)]
pub struct CategoryData {
    /// The name of the category.
    pub name: String,
    /// A display colour chosen by the client.
    #[serde(default)]
    pub color: Option<String>,
    /// An icon name chosen by the client.
    #[serde(default)]
    pub icon: Option<String>,
}

/// A route handler for creating a new category, responds with the category and 201 Created.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<CategoryData>,
) -> Result<Response, Error> {
    let name = CategoryName::new(&data.name)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let category = create_category(
        user.id,
        name,
        data.color.as_deref(),
        data.icon.as_deref(),
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(category)).into_response())
}

/// A route handler for listing the caller's categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_categories(user.id, &connection).map(Json)
}

/// A route handler for getting one of the caller's categories.
pub async fn get_category_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
    Path(category_id): Path<CategoryId>,
) -> Result<Json<Category>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_category(category_id, user.id, &connection).map(Json)
}

/// A route handler for listing the transactions in one of the caller's categories.
pub async fn get_category_transactions_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
    Path(category_id): Path<CategoryId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_category(category_id, user.id, &connection)?;
    let transactions = get_transactions_by_category(category_id, user.id, &connection)?;

    Ok(Json(transactions).into_response())
}

/// A route handler for changing the name, colour or icon of one of the caller's categories.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
    Path(category_id): Path<CategoryId>,
    Json(changes): Json<CategoryChanges>,
) -> Result<Json<Category>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_category(category_id, user.id, changes, &connection).map(Json)
}

/// A route handler for deleting one of the caller's categories.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
    Path(category_id): Path<CategoryId>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_category(category_id, user.id, &connection)?;
    tracing::info!("User {} deleted category {category_id}", user.id);

    Ok(Json(json!({ "message": "Category deleted" })).into_response())
}

/// A route handler for deleting all of the caller's categories and transactions.
pub async fn delete_all_categories_endpoint(
    State(state): State<CategoryState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let (deleted_categories, deleted_transactions) = delete_all_categories(user.id, &connection)?;
    tracing::info!(
        "User {} deleted {deleted_categories} categories and {deleted_transactions} transactions",
        user.id
    );

    Ok(Json(json!({
        "message": "All categories deleted",
        "deleted": deleted_categories,
        "deleted_transactions": deleted_transactions,
        "balance": 0,
    }))
    .into_response())
}
