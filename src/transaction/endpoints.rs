//! The route handlers for reading and writing a user's transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{
        FromRef, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::AuthUser,
    budget_check::{BudgetCheck, BudgetCheckQueue},
    database_id::TransactionId,
    transaction::{
        core::{
            Transaction, create_transaction, delete_all_transactions, delete_transaction,
            get_transaction, get_transactions, update_transaction,
        },
        request::{CreateTransactionRequest, UpdateTransactionRequest},
    },
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// Where new expenses are sent to be checked against the user's budgets.
    pub budget_checks: BudgetCheckQueue,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            budget_checks: state.budget_checks.clone(),
        }
    }
}

impl TransactionState {
    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

/// The response to deleting every transaction.
#[derive(Debug, Serialize)]
pub struct DeletedCount {
    /// How many transactions were deleted.
    pub count: usize,
}

/// A route handler for creating a new transaction.
///
/// Expenses are queued for a budget check once stored. The check runs in the
/// background and never changes the response.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthUser,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let Json(request) = payload?;
    let new_transaction = request.validate(&state.local_timezone, OffsetDateTime::now_utc())?;

    let transaction = {
        let connection = state.connection()?;
        create_transaction(user.id, new_transaction, &connection)?
    };

    state
        .budget_checks
        .enqueue(BudgetCheck::from(&transaction));

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for listing the user's transactions, newest first.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    user: AuthUser,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = state.connection()?;

    get_transactions(user.id, &connection).map(Json)
}

/// A route handler for getting one of the user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthUser,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) = path?;
    let connection = state.connection()?;

    get_transaction(transaction_id, user.id, &connection).map(Json)
}

/// A route handler for editing one of the user's transactions.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthUser,
    path: Result<Path<TransactionId>, PathRejection>,
    payload: Result<Json<UpdateTransactionRequest>, JsonRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) = path?;
    let Json(request) = payload?;
    let update = request.validate(&state.local_timezone)?;
    let connection = state.connection()?;

    update_transaction(transaction_id, user.id, update, &connection).map(Json)
}

/// A route handler for deleting one of the user's transactions, responds with the deleted transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    user: AuthUser,
    path: Result<Path<TransactionId>, PathRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) = path?;
    let connection = state.connection()?;

    delete_transaction(transaction_id, user.id, &connection)
        .inspect_err(|error| {
            if !matches!(error, Error::NotFound) {
                tracing::error!("could not delete transaction {transaction_id}: {error}");
            }
        })
        .map(Json)
}

/// A route handler for deleting all of the user's transactions.
pub async fn delete_all_transactions_endpoint(
    State(state): State<TransactionState>,
    user: AuthUser,
) -> Result<Json<DeletedCount>, Error> {
    let connection = state.connection()?;
    let count = delete_all_transactions(user.id, &connection)?;

    tracing::info!("Deleted {count} transactions for user {}", user.id);

    Ok(Json(DeletedCount { count }))
}
