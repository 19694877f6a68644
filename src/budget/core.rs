//! The budget model and its database queries.
//!
//! A budget caps how much a user plans to spend in one category during one
//! calendar month. Months are 0-based, so January is 0 and December is 11.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, UserID, database_id::BudgetId};

/// A monthly spending limit for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user that owns the budget.
    pub user_id: UserID,
    /// The category the limit applies to.
    pub category: String,
    /// The most the user wants to spend in the month.
    pub limit_amount: f64,
    /// The 0-based month.
    pub month: u8,
    /// The calendar year.
    pub year: i32,
}

/// A validated budget that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBudget {
    /// A non-empty category.
    pub category: String,
    /// A positive, finite limit.
    pub limit_amount: f64,
    /// A month in `0..=11`.
    pub month: u8,
    /// The calendar year.
    pub year: i32,
}

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                limit_amount REAL NOT NULL,
                month INTEGER NOT NULL CHECK (month BETWEEN 0 AND 11),
                year INTEGER NOT NULL,
                UNIQUE(user_id, category, month, year),
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

const BUDGET_COLUMNS: &str = "id, user_id, category, limit_amount, month, year";

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        category: row.get(2)?,
        limit_amount: row.get(3)?,
        month: row.get(4)?,
        year: row.get(5)?,
    })
}

/// Create a new budget owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateBudget] if the user already has a budget for the category, month and year,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(
    user_id: UserID,
    budget: NewBudget,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO budget (user_id, category, limit_amount, month, year)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                &budget.category,
                budget.limit_amount,
                budget.month,
                budget.year,
            ),
            map_budget_row,
        )
        .map_err(Error::from)
}

/// Retrieve the budget `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a budget owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_budget(id: BudgetId, user_id: UserID, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_budget_row)
        .map_err(Error::from)
}

/// Get all of a user's budgets, most recent month first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn get_budgets(user_id: UserID, connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget
             WHERE user_id = ?1
             ORDER BY year DESC, month DESC, id ASC"
        ))?
        .query_map((user_id.as_i64(),), map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(Error::from))
        .collect()
}

/// Set the limit of the budget `id` owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a budget owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_budget_limit(
    id: BudgetId,
    user_id: UserID,
    limit_amount: f64,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "UPDATE budget SET limit_amount = ?1 WHERE id = ?2 AND user_id = ?3
             RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row((limit_amount, id, user_id.as_i64()), map_budget_row)
        .map_err(Error::from)
}

/// Delete the budget `id` owned by `user_id`, returning the deleted row.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a budget owned by `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_budget(
    id: BudgetId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "DELETE FROM budget WHERE id = ?1 AND user_id = ?2 RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row((id, user_id.as_i64()), map_budget_row)
        .map_err(Error::from)
}

/// Find the budget `user_id` set for `category` in the 0-based `month` of `year`, if any.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn find_budget_for_period(
    user_id: UserID,
    category: &str,
    month: u8,
    year: i32,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget
             WHERE user_id = ?1 AND category = ?2 AND month = ?3 AND year = ?4"
        ))?
        .query_row((user_id.as_i64(), category, month, year), map_budget_row)
        .optional()
        .map_err(Error::from)
}

/// Get the total number of budgets across all users.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_budgets(connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row("SELECT COUNT(id) FROM budget;", [], |row| {
        row.get(0)
    })?;

    usize::try_from(count)
        .map_err(|_| Error::SqlError(rusqlite::Error::IntegralValueOutOfRange(0, count)))
}

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        budget::core::{
            NewBudget, count_budgets, create_budget, delete_budget, find_budget_for_period,
            get_budget, get_budgets, update_budget_limit,
        },
        test_utils::{create_test_user, get_test_connection},
    };

    fn food_budget(month: u8, year: i32) -> NewBudget {
        NewBudget {
            category: "Food".to_owned(),
            limit_amount: 5000.0,
            month,
            year,
        }
    }

    fn setup() -> Connection {
        get_test_connection()
    }

    #[test]
    fn create_succeeds() {
        let conn = setup();
        let user = create_test_user("jane@example.com", &conn);

        let budget = create_budget(user.id, food_budget(10, 2024), &conn).unwrap();

        assert_eq!(budget.user_id, user.id);
        assert_eq!(budget.month, 10);
        assert_eq!(budget.year, 2024);
        assert_eq!(budget.limit_amount, 5000.0);
    }

    #[test]
    fn duplicate_period_is_a_conflict_and_keeps_original() {
        let conn = setup();
        let user = create_test_user("jane@example.com", &conn);
        let original = create_budget(user.id, food_budget(10, 2024), &conn).unwrap();
        let mut duplicate = food_budget(10, 2024);
        duplicate.limit_amount = 1.0;

        let result = create_budget(user.id, duplicate, &conn);

        assert_eq!(result, Err(Error::DuplicateBudget));
        assert_eq!(get_budget(original.id, user.id, &conn), Ok(original));
    }

    #[test]
    fn same_period_for_different_users_is_allowed() {
        let conn = setup();
        let jane = create_test_user("jane@example.com", &conn);
        let john = create_test_user("john@example.com", &conn);

        create_budget(jane.id, food_budget(10, 2024), &conn).unwrap();

        assert!(create_budget(john.id, food_budget(10, 2024), &conn).is_ok());
    }

    #[test]
    fn list_is_most_recent_month_first() {
        let conn = setup();
        let user = create_test_user("jane@example.com", &conn);
        let november = create_budget(user.id, food_budget(10, 2024), &conn).unwrap();
        let january = create_budget(user.id, food_budget(0, 2025), &conn).unwrap();
        let march = create_budget(user.id, food_budget(2, 2024), &conn).unwrap();

        let budgets = get_budgets(user.id, &conn).unwrap();

        assert_eq!(budgets, vec![january, november, march]);
    }

    #[test]
    fn update_and_delete_check_owner() {
        let conn = setup();
        let owner = create_test_user("owner@example.com", &conn);
        let intruder = create_test_user("intruder@example.com", &conn);
        let budget = create_budget(owner.id, food_budget(10, 2024), &conn).unwrap();

        assert_eq!(
            update_budget_limit(budget.id, intruder.id, 1.0, &conn),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_budget(budget.id, intruder.id, &conn),
            Err(Error::NotFound)
        );

        let updated = update_budget_limit(budget.id, owner.id, 6000.0, &conn).unwrap();
        assert_eq!(updated.limit_amount, 6000.0);
        assert_eq!(delete_budget(budget.id, owner.id, &conn), Ok(updated));
        assert_eq!(count_budgets(&conn), Ok(0));
    }

    #[test]
    fn find_for_period_matches_exactly() {
        let conn = setup();
        let user = create_test_user("jane@example.com", &conn);
        let budget = create_budget(user.id, food_budget(10, 2024), &conn).unwrap();

        assert_eq!(
            find_budget_for_period(user.id, "Food", 10, 2024, &conn),
            Ok(Some(budget))
        );
        assert_eq!(
            find_budget_for_period(user.id, "Food", 11, 2024, &conn),
            Ok(None)
        );
        assert_eq!(
            find_budget_for_period(user.id, "Rent", 10, 2024, &conn),
            Ok(None)
        );
    }

    #[test]
    fn month_outside_calendar_is_rejected_by_store() {
        let conn = setup();
        let user = create_test_user("jane@example.com", &conn);

        let result = create_budget(user.id, food_budget(12, 2024), &conn);

        assert!(matches!(result, Err(Error::SqlError(_))));
    }
}
