//! Stores the ID of the most recent refresh token issued to each user.
//!
//! Each user has at most one live refresh token. Logging in again replaces
//! the stored ID, which invalidates refresh tokens handed out earlier.

use rusqlite::{Connection, OptionalExtension};

use crate::{Error, UserID};

/// Create the refresh token table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_refresh_token_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS refresh_token (
                user_id INTEGER PRIMARY KEY,
                token_id TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Record `token_id` as the live refresh token for `user_id`, replacing any
/// previous one.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn save_refresh_token_id(
    user_id: UserID,
    token_id: &str,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO refresh_token (user_id, token_id) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET token_id = excluded.token_id",
        (user_id.as_i64(), token_id),
    )?;

    Ok(())
}

/// Get the ID of the live refresh token for `user_id`, if one has been issued.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_refresh_token_id(
    user_id: UserID,
    connection: &Connection,
) -> Result<Option<String>, Error> {
    connection
        .query_row(
            "SELECT token_id FROM refresh_token WHERE user_id = ?1",
            (user_id.as_i64(),),
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
}
