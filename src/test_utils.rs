//! Shared helpers for the unit and route tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use rusqlite::Connection;
use tokio::sync::mpsc::Receiver;

use crate::{
    AppState, PasswordHash, User, ValidatedPassword,
    auth::encode_token,
    budget_check::{BudgetCheck, budget_check_queue},
    db::initialize,
    notification::{DeliveryError, PushSubscription, PushTransport},
    routing::build_router,
    user::{NewUser, create_user},
};

/// The password every test user is created with.
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// The VAPID public key served by test servers.
pub const TEST_VAPID_PUBLIC_KEY: &str =
    "BLJvZ6Vxt5lq7bqG7rXj3lq3GmY4JqQzvZ0vO2dXyrC2p1lHqJ2l0R0VtU0gC1Xg0C7kHqHnSx8l2k1M3nT4eUo";

/// The cheapest bcrypt cost, so tests that hash passwords stay fast.
const TEST_HASH_COST: u32 = 4;

/// An in-memory database with every table created.
pub fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not create in-memory SQLite database");
    initialize(&connection).expect("Could not initialize database");

    connection
}

/// Insert a user with `email` and [TEST_PASSWORD].
pub fn create_test_user(email: &str, connection: &Connection) -> User {
    let password_hash = PasswordHash::new(
        &ValidatedPassword::new_unchecked(TEST_PASSWORD),
        TEST_HASH_COST,
    )
    .expect("Could not hash password");

    create_user(
        NewUser {
            email: email.to_owned(),
            password_hash,
            name: "Test User".to_owned(),
            profession: None,
            monthly_income: None,
        },
        connection,
    )
    .expect("Could not create test user")
}

/// App state backed by an in-memory database, plus the receiving end of its budget check queue.
///
/// Hold on to the receiver for as long as the state is used, otherwise new
/// checks are dropped as if the worker had stopped.
pub fn get_test_state() -> (AppState, Receiver<BudgetCheck>) {
    let (budget_checks, receiver) = budget_check_queue(16);
    let mut state = AppState::new(
        Connection::open_in_memory().expect("Could not create in-memory SQLite database"),
        "42",
        "Etc/UTC",
        TEST_VAPID_PUBLIC_KEY,
        budget_checks,
    )
    .expect("Could not create app state");
    state.password_hash_cost = TEST_HASH_COST;

    (state, receiver)
}

/// Insert a user into the database behind `state`.
pub fn create_test_user_in(state: &AppState, email: &str) -> User {
    let connection = state.db_connection.lock().unwrap();

    create_test_user(email, &connection)
}

/// A valid access token for `user`.
pub fn bearer_token(state: &AppState, user: &User) -> String {
    encode_token(user.id, user.role, state.token_duration, &state.jwt_keys)
        .expect("Could not create token")
}

/// A test server running the full router.
pub fn get_test_server(state: AppState) -> TestServer {
    TestServer::new(build_router(state))
}

#[derive(Debug, Default)]
struct RecordingState {
    gone: Vec<String>,
    failing: Vec<String>,
    deliveries: Vec<(String, Vec<u8>)>,
}

/// A [PushTransport] that records deliveries instead of sending them.
///
/// Clones share their records, so keep a clone to inspect what a dispatcher sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingTransport {
    /// Report `endpoint` as gone.
    pub fn with_gone(self, endpoint: &str) -> Self {
        self.state.lock().unwrap().gone.push(endpoint.to_owned());
        self
    }

    /// Fail every delivery to `endpoint`.
    pub fn with_failing(self, endpoint: &str) -> Self {
        self.state.lock().unwrap().failing.push(endpoint.to_owned());
        self
    }

    /// The endpoint and payload of every successful delivery, in the order they were made.
    pub fn deliveries(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().unwrap().deliveries.clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let mut state = self.state.lock().unwrap();

        if state.gone.contains(&subscription.endpoint) {
            return Err(DeliveryError::Gone);
        }

        if state.failing.contains(&subscription.endpoint) {
            return Err(DeliveryError::Failed("push service unavailable".to_owned()));
        }

        state
            .deliveries
            .push((subscription.endpoint.clone(), payload.to_vec()));

        Ok(())
    }
}
