//! Creates the application's tables.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, budget::create_budget_table, notification::create_push_subscription_table,
    transaction::create_transaction_table, user::create_user_table,
};

/// Create all the tables the application needs, if they do not already exist.
///
/// Foreign key enforcement is switched on for `connection`, since SQLite
/// leaves it off by default and the ownership cascades rely on it.
///
/// # Errors
/// Returns an [Error::SqlError] if any table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_push_subscription_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
