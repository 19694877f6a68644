//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use time::Duration;

use crate::{
    Error, PasswordHash,
    auth::{DEFAULT_TOKEN_DURATION, JwtKeys},
    budget_check::BudgetCheckQueue,
    db::initialize,
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The keys used for signing and verifying access tokens.
    pub jwt_keys: JwtKeys,

    /// How long an access token is valid for after it is issued.
    pub token_duration: Duration,

    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The VAPID public key browsers need to subscribe to push notifications.
    pub vapid_public_key: String,

    /// Where new expenses are sent to be checked against their budget.
    pub budget_checks: BudgetCheckQueue,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is unknown.
    pub fn new(
        db_connection: Connection,
        jwt_secret: &str,
        local_timezone: &str,
        vapid_public_key: &str,
        budget_checks: BudgetCheckQueue,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            jwt_keys: JwtKeys::new(jwt_secret),
            token_duration: DEFAULT_TOKEN_DURATION,
            password_hash_cost: PasswordHash::DEFAULT_COST,
            local_timezone: local_timezone.to_owned(),
            vapid_public_key: vapid_public_key.to_owned(),
            budget_checks,
        })
    }
}

// Lets the `AuthUser` extractor find the keys in the app state.
impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_keys.clone()
    }
}

#[cfg(test)]
mod app_state_tests {
    use rusqlite::Connection;

    use crate::{AppState, Error, budget_check::budget_check_queue};

    #[test]
    fn rejects_unknown_timezone() {
        let (queue, _receiver) = budget_check_queue(1);

        let result = AppState::new(
            Connection::open_in_memory().unwrap(),
            "secret",
            "Middle/Earth",
            "public-key",
            queue,
        );

        assert_eq!(
            result.map(|_| ()),
            Err(Error::InvalidTimezoneError("Middle/Earth".to_owned()))
        );
    }

    #[test]
    fn initializes_database() {
        let (queue, _receiver) = budget_check_queue(1);

        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "secret",
            "Etc/UTC",
            "public-key",
            queue,
        )
        .unwrap();

        let connection = state.db_connection.lock().unwrap();
        let table_count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('user', 'transaction', 'budget', 'push_subscription')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 4);
    }
}
