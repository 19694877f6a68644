use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::AuthUser,
    csv_import::parse::{SkippedRow, parse_transactions_csv},
    transaction::create_transactions,
};

/// The multipart field the CSV file is uploaded in.
const FILE_FIELD: &str = "file";

/// Content types browsers send for CSV files.
const CSV_CONTENT_TYPES: [&str; 2] = ["text/csv", "application/vnd.ms-excel"];

/// The state needed for importing transactions.
#[derive(Debug, Clone)]
pub struct ImportState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ImportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The result of an import.
#[derive(Debug, Serialize)]
pub struct ImportSummary {
    /// How many transactions were inserted.
    pub count: usize,
    /// The rows that were left out and why.
    pub skipped: Vec<SkippedRow>,
}

/// Route handler for importing transactions from a CSV file.
///
/// All valid rows are inserted in a single SQL transaction, so either every
/// row is imported or none are. Imported expenses are not checked against
/// budgets.
pub async fn import_transactions_endpoint(
    State(state): State<ImportState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ImportSummary>), Error> {
    let mut multipart = multipart.map_err(|rejection| {
        Error::MultipartError(rejection.body_text())
    })?;

    let csv_data = read_csv_field(&mut multipart).await?;

    let rows = parse_transactions_csv(&csv_data, &state.local_timezone, OffsetDateTime::now_utc())
        .inspect_err(|error| tracing::debug!("Failed to parse CSV: {error}"))?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let count = create_transactions(user.id, &rows.transactions, &connection)
        .inspect_err(|error| tracing::error!("Failed to import transactions: {error}"))?;

    tracing::info!(
        "Imported {count} transactions for user {}, skipped {} rows",
        user.id,
        rows.skipped.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(ImportSummary {
            count,
            skipped: rows.skipped,
        }),
    ))
}

/// Find the `file` field and read it, checking that it looks like a CSV.
async fn read_csv_field(multipart: &mut Multipart) -> Result<Vec<u8>, Error> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().unwrap_or_default().to_owned();

        if !is_csv(&file_name, &content_type) {
            tracing::debug!("Rejected upload '{file_name}' with content type '{content_type}'");
            return Err(Error::NotCSV);
        }

        let data = field.bytes().await.map_err(|error| {
            tracing::error!("Could not read data from multipart form field: {error}");
            Error::MultipartError("could not read the uploaded file".to_owned())
        })?;

        tracing::debug!("Received file '{}' that is {} bytes", file_name, data.len());

        return Ok(data.to_vec());
    }

    Err(Error::MultipartError("no file uploaded".to_owned()))
}

fn is_csv(file_name: &str, content_type: &str) -> bool {
    let mime_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    CSV_CONTENT_TYPES.contains(&mime_type.as_str())
        || file_name.to_ascii_lowercase().ends_with(".csv")
}
