//! Defines the core data models and database queries for transactions.
//!
//! Every query that touches a single transaction filters on both the row ID
//! and the owner's [UserID], so a transaction that belongs to someone else is
//! reported as [Error::NotFound].

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, UserID, database_id::TransactionId};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// The name stored in the database and sent to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            other => Err(Error::Validation(format!(
                "unknown transaction type \"{other}\", expected INCOME or EXPENSE"
            ))),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// A free text category, e.g. "Food" or "Rent".
    pub category: String,
    /// How much money changed hands. Always positive, `kind` gives the direction.
    pub amount: f64,
    /// Any extra detail the user wants to keep.
    pub notes: Option<String>,
    /// When the transaction happened, stored to the second in UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// A validated transaction that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Whether the money was earned or spent.
    pub kind: TransactionType,
    /// A non-empty category.
    pub category: String,
    /// A positive, finite amount.
    pub amount: f64,
    /// Optional notes.
    pub notes: Option<String>,
    /// When the transaction happened.
    pub date: OffsetDateTime,
}

/// Changes to apply to an existing transaction. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionUpdate {
    /// The new type.
    pub kind: Option<TransactionType>,
    /// The new category.
    pub category: Option<String>,
    /// The new amount.
    pub amount: Option<f64>,
    /// The new notes.
    pub notes: Option<String>,
    /// The new date.
    pub date: Option<OffsetDateTime>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                notes TEXT,
                date INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Used by the budget check to sum a month of spending in one category.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_category_date
            ON \"transaction\"(user_id, category, date);",
        (),
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str = "id, user_id, type, category, amount, notes, date";

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let unix_timestamp: i64 = row.get(6)?;
    let date = OffsetDateTime::from_unix_timestamp(unix_timestamp).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(error))
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: row.get(2)?,
        category: row.get(3)?,
        amount: row.get(4)?,
        notes: row.get(5)?,
        date,
    })
}

/// Create a new transaction owned by `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error,
/// including when `user_id` does not refer to a registered user.
pub fn create_transaction(
    user_id: UserID,
    transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, type, category, amount, notes, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                transaction.kind,
                &transaction.category,
                transaction.amount,
                &transaction.notes,
                transaction.date.unix_timestamp(),
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Insert many transactions owned by `user_id` in one SQL transaction.
///
/// Either every transaction is inserted or none are.
///
/// Returns the number of inserted transactions.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error, in which case
/// nothing is inserted.
pub fn create_transactions(
    user_id: UserID,
    transactions: &[NewTransaction],
    connection: &Connection,
) -> Result<usize, Error> {
    if transactions.is_empty() {
        return Ok(0);
    }

    let sql_transaction = connection.unchecked_transaction()?;

    {
        let mut statement = sql_transaction.prepare(
            "INSERT INTO \"transaction\" (user_id, type, category, amount, notes, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for transaction in transactions {
            statement.execute((
                user_id.as_i64(),
                transaction.kind,
                &transaction.category,
                transaction.amount,
                &transaction.notes,
                transaction.date.unix_timestamp(),
            ))?;
        }
    }

    sql_transaction.commit()?;

    Ok(transactions.len())
}

/// Retrieve the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
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
        .map_err(Error::from)
}

/// Get all of a user's transactions, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn get_transactions(user_id: UserID, connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((user_id.as_i64(),), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Apply `update` to the transaction `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let current = get_transaction(id, user_id, connection)?;

    let kind = update.kind.unwrap_or(current.kind);
    let category = update.category.unwrap_or(current.category);
    let amount = update.amount.unwrap_or(current.amount);
    let notes = update.notes.or(current.notes);
    let date = update.date.unwrap_or(current.date);

    connection
        .prepare(&format!(
            "UPDATE \"transaction\"
             SET type = ?1, category = ?2, amount = ?3, notes = ?4, date = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                kind,
                category,
                amount,
                notes,
                date.unix_timestamp(),
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Delete the transaction `id` owned by `user_id`, returning the deleted row.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction owned by `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row((id, user_id.as_i64()), map_transaction_row)
        .map_err(Error::from)
}

/// Delete every transaction owned by `user_id`, returning how many were deleted.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn delete_all_transactions(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    connection
        .execute(
            "DELETE FROM \"transaction\" WHERE user_id = ?1",
            (user_id.as_i64(),),
        )
        .map_err(Error::from)
}

/// Sum the expenses `user_id` recorded under `category` in `[start, end)`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn sum_expenses(
    user_id: UserID,
    category: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
    connection: &Connection,
) -> Result<f64, Error> {
    connection
        .query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM \"transaction\"
             WHERE user_id = ?1 AND category = ?2 AND type = ?3
               AND date >= ?4 AND date < ?5",
            (
                user_id.as_i64(),
                category,
                TransactionType::Expense,
                start.unix_timestamp(),
                end.unix_timestamp(),
            ),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Get the total number of transactions across all users.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
        row.get(0)
    })?;

    usize::try_from(count)
        .map_err(|_| Error::SqlError(rusqlite::Error::IntegralValueOutOfRange(0, count)))
}

// ============================================================================
// TESTS
// ============================================================================
