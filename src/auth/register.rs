//! Account creation.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    user::{NewUser, UserProfile, create_user},
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The bcrypt cost used to hash new passwords.
    pub password_hash_cost: u32,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            password_hash_cost: state.password_hash_cost,
        }
    }
}

/// The details a user signs up with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    /// The user's display name.
    pub name: String,
    /// The email address the user will log in with.
    pub email: String,
    /// The password in plain text.
    pub password: String,
    /// The user's occupation.
    #[serde(default)]
    pub profession: Option<String>,
    /// The user's monthly income.
    #[serde(default)]
    pub monthly_income: Option<f64>,
}

impl RegisterRequest {
    /// Check the request and hash the password.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::Validation] if the email, name or income is invalid,
    /// - [Error::TooWeak] if the password is easy to guess,
    /// - [Error::HashingError] if the password could not be hashed.
    pub fn validate(self, password_hash_cost: u32) -> Result<NewUser, Error> {
        let email = self.email.trim().to_lowercase();
        if !EmailAddress::is_valid(&email) {
            return Err(Error::Validation(format!(
                "\"{}\" is not a valid email address",
                self.email
            )));
        }

        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("name must not be empty".to_owned()));
        }

        if let Some(income) = self
            .monthly_income
            .filter(|income| !income.is_finite() || *income < 0.0)
        {
            return Err(Error::Validation(format!(
                "monthlyIncome must be zero or more, got {income}"
            )));
        }

        let password = ValidatedPassword::new(&self.password, &[&email, name])?;
        let password_hash = PasswordHash::new(&password, password_hash_cost)?;

        Ok(NewUser {
            email,
            password_hash,
            name: name.to_owned(),
            profession: self
                .profession
                .map(|profession| profession.trim().to_owned())
                .filter(|profession| !profession.is_empty()),
            monthly_income: self.monthly_income,
        })
    }
}

/// A route handler for creating a new user.
///
/// Responds with the new user's profile, never the password hash.
pub async fn register_user(
    State(state): State<RegistrationState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), Error> {
    let Json(request) = payload?;
    let new_user = request.validate(state.password_hash_cost)?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let user = create_user(new_user, &connection)?;
    tracing::info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}
