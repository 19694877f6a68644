//! A personal finance tracker served as a JSON REST API.
//!
//! Users register and log in with an email and password, record income and
//! expenses, set monthly spending limits per category and import statements
//! from CSV files. When an expense pushes a category over its monthly limit,
//! the user is sent a web push notification on every browser they subscribed
//! from.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use tokio::signal;

mod admin;
mod app_state;
mod auth;
mod budget;
mod budget_check;
mod csv_import;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod notification;
mod password;
mod routing;
mod timestamp;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use budget_check::{
    BudgetCheck, BudgetCheckQueue, BudgetCheckWorker, DEFAULT_QUEUE_CAPACITY, budget_check_queue,
};
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use notification::{DeliveryError, NotificationDispatcher, PushTransport, WebPushTransport};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use user::{Role, User, UserID, get_user_by_email, set_user_role};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A request body or parameter failed validation.
    ///
    /// The string is shown to the client and should explain how to fix the
    /// request.
    #[error("{0}")]
    Validation(String),

    /// The request body could not be parsed as the expected JSON document.
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// The email and password combination does not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not include a bearer token.
    #[error("missing bearer token")]
    MissingToken,

    /// The bearer token could not be verified or has expired.
    #[error("invalid or expired bearer token")]
    InvalidToken,

    /// The authenticated user does not have the role needed for the route.
    #[error("you do not have permission to access this resource")]
    Forbidden,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A JSON web token could not be created.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// The requested resource was not found.
    ///
    /// Resources that belong to another user are reported with this error too,
    /// so clients cannot tell whether an ID exists.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A budget already exists for the category, month and year.
    #[error("a budget already exists for this category and month")]
    DuplicateBudget,

    /// The email address is already registered.
    #[error("an account with this email address already exists")]
    DuplicateEmail,

    /// The multipart form could not be read, or did not contain a file.
    #[error("could not read multipart form: {0}")]
    MultipartError(String),

    /// The uploaded file is not a CSV.
    #[error("only CSV files are allowed")]
    NotCSV,

    /// The CSV had issues that prevented it from being parsed.
    #[error("could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// The push notification keys could not be loaded.
    #[error("invalid push notification configuration: {0}")]
    PushConfiguration(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.contains("budget.") =>
            {
                Error::DuplicateBudget
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::InvalidJson(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

/// The JSON body sent to clients for every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    error: &'static str,
    message: String,
}

impl Error {
    /// The HTTP status code the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::InvalidJson(_)
            | Error::TooWeak(_)
            | Error::MultipartError(_)
            | Error::NotCSV
            | Error::InvalidCSV(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::MissingToken | Error::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateBudget | Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::HashingError(_)
            | Error::TokenCreation(_)
            | Error::PushConfiguration(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are for the server logs only.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown"),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use rusqlite::Connection;

    use crate::Error;

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }

    #[test]
    fn unique_violation_on_email_maps_to_duplicate_email() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE user (email TEXT UNIQUE)", ())
            .unwrap();
        conn.execute("INSERT INTO user (email) VALUES ('a@b.c')", ())
            .unwrap();

        let error = conn
            .execute("INSERT INTO user (email) VALUES ('a@b.c')", ())
            .unwrap_err();

        assert_eq!(Error::from(error), Error::DuplicateEmail);
    }

    #[tokio::test]
    async fn internal_errors_hide_details_from_client() {
        let response = Error::HashingError("bcrypt exploded".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["statusCode"], 500);
        assert!(!body["message"].as_str().unwrap().contains("bcrypt"));
    }

    #[tokio::test]
    async fn client_errors_include_message() {
        let response = Error::DuplicateBudget.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Conflict");
        assert_eq!(
            body["message"],
            "a budget already exists for this category and month"
        );
    }
}
