//! Aggregate statistics for administrators.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, auth::AdminUser, budget::count_budgets, transaction::count_transactions,
    user::count_users,
};

/// The state needed for the admin routes.
#[derive(Debug, Clone)]
pub struct AdminState {
    /// The database connection for reading the counts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AdminState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Row counts across all users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    /// Registered users.
    pub total_users: usize,
    /// Transactions belonging to any user.
    pub total_transactions: usize,
    /// Budgets belonging to any user.
    pub total_budgets: usize,
}

/// Route handler for the admin statistics. Only admins may call it.
pub async fn admin_stats(
    State(state): State<AdminState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<AdminStats>, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let stats = AdminStats {
        total_users: count_users(&connection)?,
        total_transactions: count_transactions(&connection)?,
        total_budgets: count_budgets(&connection)?,
    };

    tracing::debug!("Admin {} requested stats: {stats:?}", admin.id);

    Ok(Json(stats))
}
