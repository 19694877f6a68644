//! Decides whether a new expense has pushed its category over the monthly budget.

use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    Error,
    budget::find_budget_for_period,
    budget_check::BudgetCheck,
    timestamp::{month_bounds, month_of},
    timezone::get_offset_at,
    transaction::{TransactionType, sum_expenses},
};

/// What a budget check found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetCheckOutcome {
    /// The transaction was income, which never counts against a budget.
    NotAnExpense,
    /// The user has no budget for the category in that month.
    NoBudget,
    /// The month's spending is at or under the limit.
    WithinBudget {
        /// The month's spending so far.
        total: f64,
        /// The budget's limit.
        limit: f64,
    },
    /// The month's spending is over the limit.
    Exceeded {
        /// The month's spending so far.
        total: f64,
        /// The budget's limit.
        limit: f64,
    },
}

/// Compare the month-to-date spending in the checked transaction's category against its budget.
///
/// The month is the calendar month the transaction falls in at `local_timezone`.
/// Spending is summed over every expense in the category from local midnight on
/// the first of that month up to, but not including, the first of the next.
/// Each midnight uses the offset in force on that day.
///
/// # Errors
/// Returns [Error::InvalidTimezoneError] if `local_timezone` is unknown, or
/// [Error::SqlError] if the budget or transactions could not be read.
pub fn evaluate_budget(
    check: &BudgetCheck,
    local_timezone: &str,
    connection: &Connection,
) -> Result<BudgetCheckOutcome, Error> {
    if check.kind != TransactionType::Expense {
        return Ok(BudgetCheckOutcome::NotAnExpense);
    }

    let local_offset = get_offset_at(local_timezone, check.date)
        .ok_or_else(|| Error::InvalidTimezoneError(local_timezone.to_owned()))?;
    let (month, year) = month_of(check.date, local_offset);

    let Some(budget) =
        find_budget_for_period(check.user_id, &check.category, month, year, connection)?
    else {
        return Ok(BudgetCheckOutcome::NoBudget);
    };

    let (start, end) = month_bounds(month, year, local_timezone)?;
    let total = sum_expenses(check.user_id, &check.category, start, end, connection)?;

    if total > budget.limit_amount {
        Ok(BudgetCheckOutcome::Exceeded {
            total,
            limit: budget.limit_amount,
        })
    } else {
        Ok(BudgetCheckOutcome::WithinBudget {
            total,
            limit: budget.limit_amount,
        })
    }
}

/// The notification sent when spending in `category` goes over budget.
pub fn over_budget_payload(category: &str, total: f64, limit: f64) -> Value {
    json!({
        "title": "Budget Exceeded! 🚨",
        "body": format!(
            "You have spent ₹{total} on {category} this month, exceeding your limit of ₹{limit}."
        ),
        "icon": "/icon-192.png",
    })
}
