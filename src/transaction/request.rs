//! The JSON bodies clients send to create and edit transactions.

use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    timestamp::parse_timestamp,
    transaction::core::{NewTransaction, TransactionType, TransactionUpdate},
};

/// The body of a request to create a transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTransactionRequest {
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// The category, e.g. "Food".
    pub category: String,
    /// The amount of money, must be positive.
    pub amount: f64,
    /// Optional free text.
    #[serde(default)]
    pub notes: Option<String>,
    /// When the transaction happened. Defaults to the time of the request.
    #[serde(default)]
    pub date: Option<String>,
}

impl CreateTransactionRequest {
    /// Check the request and turn it into a [NewTransaction].
    ///
    /// Dates without an offset are read as wall clock time in `local_timezone`.
    /// A missing date becomes `now`.
    ///
    /// # Errors
    /// Returns [Error::Validation] describing the first invalid field.
    pub fn validate(
        self,
        local_timezone: &str,
        now: OffsetDateTime,
    ) -> Result<NewTransaction, Error> {
        let date = match self.date {
            Some(date) => validate_date(&date, local_timezone)?,
            None => now,
        };

        Ok(NewTransaction {
            kind: self.kind,
            category: validate_category(&self.category)?,
            amount: validate_amount(self.amount)?,
            notes: self.notes,
            date: date.replace_nanosecond(0).unwrap_or(date),
        })
    }
}

/// The body of a request to edit a transaction. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTransactionRequest {
    /// The new type.
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionType>,
    /// The new category.
    #[serde(default)]
    pub category: Option<String>,
    /// The new amount.
    #[serde(default)]
    pub amount: Option<f64>,
    /// The new notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// The new date.
    #[serde(default)]
    pub date: Option<String>,
}

impl UpdateTransactionRequest {
    /// Check the request and turn it into a [TransactionUpdate].
    ///
    /// # Errors
    /// Returns [Error::Validation] describing the first invalid field.
    pub fn validate(self, local_timezone: &str) -> Result<TransactionUpdate, Error> {
        Ok(TransactionUpdate {
            kind: self.kind,
            category: self
                .category
                .as_deref()
                .map(validate_category)
                .transpose()?,
            amount: self.amount.map(validate_amount).transpose()?,
            notes: self.notes,
            date: self
                .date
                .as_deref()
                .map(|date| validate_date(date, local_timezone))
                .transpose()?,
        })
    }
}

fn validate_category(category: &str) -> Result<String, Error> {
    let category = category.trim();

    if category.is_empty() {
        return Err(Error::Validation("category must not be empty".to_owned()));
    }

    Ok(category.to_owned())
}

fn validate_amount(amount: f64) -> Result<f64, Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::Validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }

    Ok(amount)
}

fn validate_date(date: &str, local_timezone: &str) -> Result<OffsetDateTime, Error> {
    parse_timestamp(date, local_timezone).ok_or_else(|| {
        Error::Validation(format!(
            "date \"{date}\" must be an ISO 8601 date or date-time"
        ))
    })
}

#[cfg(test)]
mod request_tests {
    use time::macros::datetime;

    use crate::{
        Error,
        transaction::{
            core::TransactionType,
            request::{CreateTransactionRequest, UpdateTransactionRequest},
        },
    };

    fn request() -> CreateTransactionRequest {
        CreateTransactionRequest {
            kind: TransactionType::Expense,
            category: " Food ".to_owned(),
            amount: 12.5,
            notes: None,
            date: Some("2024-11-05".to_owned()),
        }
    }

    #[test]
    fn valid_request_is_normalised() {
        let now = datetime!(2025-01-01 0:00 UTC);

        let transaction = request().validate("Etc/UTC", now).unwrap();

        assert_eq!(transaction.category, "Food");
        assert_eq!(transaction.date, datetime!(2024-11-05 0:00 UTC));
    }

    #[test]
    fn missing_date_defaults_to_now() {
        let now = datetime!(2025-01-01 9:30 UTC);
        let mut request = request();
        request.date = None;

        let transaction = request.validate("Etc/UTC", now).unwrap();

        assert_eq!(transaction.date, now);
    }

    #[test]
    fn rejects_non_positive_amounts() {
        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let mut request = request();
            request.amount = amount;

            let result = request.validate("Etc/UTC", datetime!(2025-01-01 0:00 UTC));

            assert!(
                matches!(result, Err(Error::Validation(_))),
                "want validation error for amount {amount}, got {result:?}"
            );
        }
    }

    #[test]
    fn rejects_blank_category_and_bad_date() {
        let mut blank = request();
        blank.category = "  ".to_owned();
        let mut bad_date = request();
        bad_date.date = Some("last tuesday".to_owned());
        let now = datetime!(2025-01-01 0:00 UTC);

        assert!(matches!(
            blank.validate("Etc/UTC", now),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            bad_date.validate("Etc/UTC", now),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn naive_date_uses_offset_on_that_date() {
        let mut request = request();
        request.date = Some("2024-07-01".to_owned());

        let transaction = request
            .validate("Pacific/Auckland", datetime!(2025-01-01 0:00 UTC))
            .unwrap();

        assert_eq!(transaction.date, datetime!(2024-06-30 12:00 UTC));

        let update = UpdateTransactionRequest {
            date: Some("2024-12-01".to_owned()),
            ..Default::default()
        }
        .validate("Pacific/Auckland")
        .unwrap();

        assert_eq!(update.date, Some(datetime!(2024-11-30 11:00 UTC)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = serde_json::from_str::<CreateTransactionRequest>(
            r#"{"type": "EXPENSE", "category": "Food", "amount": 1, "userId": 2}"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn update_validates_only_given_fields() {
        let update = UpdateTransactionRequest {
            amount: Some(3.0),
            ..Default::default()
        }
        .validate("Etc/UTC")
        .unwrap();

        assert_eq!(update.amount, Some(3.0));
        assert_eq!(update.category, None);

        let invalid = UpdateTransactionRequest {
            amount: Some(-3.0),
            ..Default::default()
        }
        .validate("Etc/UTC");

        assert!(matches!(invalid, Err(Error::Validation(_))));
    }
}
