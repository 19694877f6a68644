//! Turns an uploaded CSV statement into transactions.
//!
//! The expected header row is `Date,Description,Amount,Type,Category`, matched
//! case-insensitively. Extra columns are ignored and missing ones fall back to
//! defaults, so exports from most spreadsheets import without editing.

use csv::ReaderBuilder;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    timestamp::parse_timestamp,
    transaction::{NewTransaction, TransactionType},
};

/// The category given to rows without one.
pub const DEFAULT_CATEGORY: &str = "Others";

/// Why a row was left out of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The amount column was missing or blank.
    MissingAmount,
    /// The amount was not a positive number.
    InvalidAmount,
}

/// A row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// The 1-based line the row starts on, counting the header as line 1.
    pub line: u64,
    /// Why the row was skipped.
    pub reason: SkipReason,
}

/// The rows read from a CSV file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportedRows {
    /// The rows that can be inserted.
    pub transactions: Vec<NewTransaction>,
    /// The rows that were left out.
    pub skipped: Vec<SkippedRow>,
}

/// Parse the CSV in `bytes` into transactions.
///
/// Invalid UTF-8 is replaced rather than rejected. Dates without an offset
/// are read as wall clock time in `local_timezone` on that date, and rows
/// with a missing or unreadable date are given `now`. Rows without a usable
/// amount are reported in [ImportedRows::skipped] instead of failing the import.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the header row or a record cannot be read.
pub fn parse_transactions_csv(
    bytes: &[u8],
    local_timezone: &str,
    now: OffsetDateTime,
) -> Result<ImportedRows, Error> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(format!("could not read header row: {error}")))?
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|header| header == name);

    let amount_column = column("amount");
    let type_column = column("type");
    let date_column = column("date");
    let category_column = column("category");
    let description_column = column("description");
    let notes_column = column("notes");

    let mut rows = ImportedRows::default();

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|error| Error::InvalidCSV(error.to_string()))?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);

        let field = |column: Option<usize>| {
            column
                .and_then(|column| record.get(column))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let Some(raw_amount) = field(amount_column) else {
            rows.skipped.push(SkippedRow {
                line,
                reason: SkipReason::MissingAmount,
            });
            continue;
        };

        let Some(amount) = parse_amount(raw_amount) else {
            rows.skipped.push(SkippedRow {
                line,
                reason: SkipReason::InvalidAmount,
            });
            continue;
        };

        let kind = match field(type_column) {
            Some(kind) if kind.eq_ignore_ascii_case("INCOME") => TransactionType::Income,
            _ => TransactionType::Expense,
        };

        let date = field(date_column)
            .and_then(|date| parse_timestamp(date, local_timezone))
            .unwrap_or(now);

        let category = field(category_column).unwrap_or(DEFAULT_CATEGORY);
        let notes = field(description_column)
            .or_else(|| field(notes_column))
            .unwrap_or_default();

        rows.transactions.push(NewTransaction {
            kind,
            category: category.to_owned(),
            amount,
            notes: Some(notes.to_owned()),
            date,
        });
    }

    Ok(rows)
}

/// Read a currency string such as "₹1,000.50" or "$ -20" as a number.
///
/// Everything other than digits, '.' and '-' is dropped, then the longest
/// leading number is used, so "1.000.50" reads as 1. Returns `None` unless
/// the result is a finite number greater than zero.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    parse_float_prefix(&cleaned).filter(|amount| amount.is_finite() && *amount > 0.0)
}

/// Parse the longest prefix of `text` that forms a decimal number.
fn parse_float_prefix(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let mut seen_digit = false;
    let mut seen_point = false;

    while let Some(byte) = bytes.get(end) {
        match byte {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_point => seen_point = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }

    text[..end].parse().ok()
}
