//! Exchanging an email and password for a bearer token.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth::token::{JwtKeys, encode_token},
    user::{UserProfile, get_user_by_email},
};

/// The state needed to log in a user.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The keys used to sign tokens.
    pub jwt_keys: JwtKeys,
    /// How long issued tokens are valid for.
    pub token_duration: Duration,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            jwt_keys: state.jwt_keys.clone(),
            token_duration: state.token_duration,
        }
    }
}

/// The credentials a user logs in with.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogInRequest {
    /// Email entered during log in.
    pub email: String,
    /// Password entered during log in.
    pub password: String,
}

/// A bearer token and the profile of the user it was issued to.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogInResponse {
    /// The token to send in the `Authorization` header.
    pub access_token: String,
    /// The logged in user.
    pub user: UserProfile,
}

/// Handler for log-in requests.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email does not belong to a registered user.
/// - The password is not correct.
/// - An internal error occurred when verifying the password or signing the token.
///
/// An unknown email and a wrong password give the same [Error::InvalidCredentials].
pub async fn log_in(
    State(state): State<LogInState>,
    payload: Result<Json<LogInRequest>, JsonRejection>,
) -> Result<Json<LogInResponse>, Error> {
    let Json(credentials) = payload?;

    let user = {
        let connection = state.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })?;

        get_user_by_email(&credentials.email, &connection)?.ok_or(Error::InvalidCredentials)?
    };

    if !user.password_hash.verify(&credentials.password)? {
        tracing::info!("Failed log in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let access_token = encode_token(user.id, user.role, state.token_duration, &state.jwt_keys)?;

    Ok(Json(LogInResponse {
        access_token,
        user: UserProfile::from(&user),
    }))
}

#[cfg(test)]
mod log_in_tests {
    use serde_json::{Value, json};

    use crate::{
        Role,
        auth::{log_in::LogInResponse, token::decode_token},
        endpoints,
        test_utils::{TEST_PASSWORD, create_test_user_in, get_test_server, get_test_state},
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let (state, _budget_checks) = get_test_state();
        let user = create_test_user_in(&state, "jane@example.com");
        let keys = state.jwt_keys.clone();
        let server = get_test_server(state);

        let response = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "JANE@example.com", "password": TEST_PASSWORD }))
            .await;

        response.assert_status_ok();
        let body = response.json::<LogInResponse>();
        assert_eq!(body.user.id, user.id);
        let claims = decode_token(&body.access_token, &keys).unwrap();
        assert_eq!(claims.sub, user.id.as_i64());
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password_or_unknown_email() {
        let (state, _budget_checks) = get_test_state();
        create_test_user_in(&state, "jane@example.com");
        let server = get_test_server(state);

        let wrong_password = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "jane@example.com", "password": "wrong password" }))
            .await;
        let unknown_email = server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "john@example.com", "password": TEST_PASSWORD }))
            .await;

        wrong_password.assert_status_unauthorized();
        unknown_email.assert_status_unauthorized();
        assert_eq!(
            wrong_password.json::<Value>(),
            unknown_email.json::<Value>()
        );
    }

    #[tokio::test]
    async fn log_in_rejects_missing_fields() {
        let (state, _budget_checks) = get_test_state();
        let server = get_test_server(state);

        server
            .post(endpoints::LOG_IN)
            .json(&json!({ "email": "jane@example.com" }))
            .await
            .assert_status_bad_request();
    }
}
