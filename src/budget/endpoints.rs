//! The route handlers for managing a user's budgets.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{
        FromRef, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::AuthUser,
    budget::core::{
        Budget, NewBudget, create_budget, delete_budget, get_budget, get_budgets,
        update_budget_limit,
    },
    database_id::BudgetId,
};

/// The earliest and latest years a budget can be set for.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=9999;

/// The state needed to manage budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

impl BudgetState {
    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

/// The body of a request to create a budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateBudgetRequest {
    /// The category the limit applies to.
    pub category: String,
    /// The most the user wants to spend in the month.
    pub limit_amount: f64,
    /// The 0-based month.
    pub month: i64,
    /// The calendar year.
    pub year: i64,
}

impl CreateBudgetRequest {
    /// Check the request and turn it into a [NewBudget].
    ///
    /// # Errors
    /// Returns [Error::Validation] describing the first invalid field.
    pub fn validate(self) -> Result<NewBudget, Error> {
        let category = self.category.trim();
        if category.is_empty() {
            return Err(Error::Validation("category must not be empty".to_owned()));
        }

        let month = u8::try_from(self.month)
            .ok()
            .filter(|month| *month <= 11)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "month must be between 0 (January) and 11 (December), got {}",
                    self.month
                ))
            })?;

        let year = i32::try_from(self.year)
            .ok()
            .filter(|year| YEAR_RANGE.contains(year))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "year must be between {} and {}, got {}",
                    YEAR_RANGE.start(),
                    YEAR_RANGE.end(),
                    self.year
                ))
            })?;

        Ok(NewBudget {
            category: category.to_owned(),
            limit_amount: validate_limit(self.limit_amount)?,
            month,
            year,
        })
    }
}

/// The body of a request to change a budget's limit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateBudgetRequest {
    /// The new limit.
    pub limit_amount: f64,
}

fn validate_limit(limit_amount: f64) -> Result<f64, Error> {
    if !limit_amount.is_finite() || limit_amount <= 0.0 {
        return Err(Error::Validation(format!(
            "limitAmount must be a positive number, got {limit_amount}"
        )));
    }

    Ok(limit_amount)
}

/// A route handler for creating a new budget.
///
/// Responds with `409 Conflict` if the user already has a budget for the category and month.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    user: AuthUser,
    payload: Result<Json<CreateBudgetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Budget>), Error> {
    let Json(request) = payload?;
    let new_budget = request.validate()?;
    let connection = state.connection()?;

    let budget = create_budget(user.id, new_budget, &connection)?;

    Ok((StatusCode::CREATED, Json(budget)))
}

/// A route handler for listing the user's budgets, most recent month first.
pub async fn list_budgets_endpoint(
    State(state): State<BudgetState>,
    user: AuthUser,
) -> Result<Json<Vec<Budget>>, Error> {
    let connection = state.connection()?;

    get_budgets(user.id, &connection).map(Json)
}

/// A route handler for getting one of the user's budgets.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    user: AuthUser,
    path: Result<Path<BudgetId>, PathRejection>,
) -> Result<Json<Budget>, Error> {
    let Path(budget_id) = path?;
    let connection = state.connection()?;

    get_budget(budget_id, user.id, &connection).map(Json)
}

/// A route handler for changing the limit of one of the user's budgets.
///
/// Serves both `PUT` and `PATCH`.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    user: AuthUser,
    path: Result<Path<BudgetId>, PathRejection>,
    payload: Result<Json<UpdateBudgetRequest>, JsonRejection>,
) -> Result<Json<Budget>, Error> {
    let Path(budget_id) = path?;
    let Json(request) = payload?;
    let limit_amount = validate_limit(request.limit_amount)?;
    let connection = state.connection()?;

    update_budget_limit(budget_id, user.id, limit_amount, &connection).map(Json)
}

/// A route handler for deleting one of the user's budgets, responds with the deleted budget.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    user: AuthUser,
    path: Result<Path<BudgetId>, PathRejection>,
) -> Result<Json<Budget>, Error> {
    let Path(budget_id) = path?;
    let connection = state.connection()?;

    delete_budget(budget_id, user.id, &connection).map(Json)
}


#[cfg(test)]
mod endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        budget::core::Budget,
        endpoints::{self, format_endpoint},
        test_utils::{bearer_token, create_test_user_in, get_test_server, get_test_state},
    };

    #[tokio::test]
    async fn create_then_duplicate_is_conflict() {
        let (state, _budget_checks) = get_test_state();
        let user = create_test_user_in(&state, "jane@example.com");
        let token = bearer_token(&state, &user);
        let server = get_test_server(state);
        let body = json!({ "category": "Food", "limitAmount": 5000, "month": 10, "year": 2024 });

        let created = server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .json(&body)
            .await;
        created.assert_status(StatusCode::CREATED);
        let original = created.json::<Budget>();

        server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .json(&json!({ "category": "Food", "limitAmount": 1, "month": 10, "year": 2024 }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let stored = server
            .get(&format_endpoint(endpoints::BUDGET, original.id))
            .authorization_bearer(&token)
            .await
            .json::<Budget>();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn put_and_patch_both_update_limit() {
        let (state, _budget_checks) = get_test_state();
        let user = create_test_user_in(&state, "jane@example.com");
        let token = bearer_token(&state, &user);
        let server = get_test_server(state);
        let budget = server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .json(&json!({ "category": "Food", "limitAmount": 5000, "month": 10, "year": 2024 }))
            .await
            .json::<Budget>();
        let path = format_endpoint(endpoints::BUDGET, budget.id);

        let put = server
            .put(&path)
            .authorization_bearer(&token)
            .json(&json!({ "limitAmount": 6000 }))
            .await
            .json::<Budget>();
        let patch = server
            .patch(&path)
            .authorization_bearer(&token)
            .json(&json!({ "limitAmount": 7000 }))
            .await
            .json::<Budget>();

        assert_eq!(put.limit_amount, 6000.0);
        assert_eq!(patch.limit_amount, 7000.0);
        assert_eq!(patch.category, "Food");
    }

    #[tokio::test]
    async fn update_rejects_other_fields() {
        let (state, _budget_checks) = get_test_state();
        let user = create_test_user_in(&state, "jane@example.com");
        let token = bearer_token(&state, &user);
        let server = get_test_server(state);
        let budget = server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .json(&json!({ "category": "Food", "limitAmount": 5000, "month": 10, "year": 2024 }))
            .await
            .json::<Budget>();

        server
            .patch(&format_endpoint(endpoints::BUDGET, budget.id))
            .authorization_bearer(&token)
            .json(&json!({ "limitAmount": 1, "category": "Rent" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn other_users_budget_is_not_found() {
        let (state, _budget_checks) = get_test_state();
        let owner = create_test_user_in(&state, "owner@example.com");
        let intruder = create_test_user_in(&state, "intruder@example.com");
        let owner_token = bearer_token(&state, &owner);
        let intruder_token = bearer_token(&state, &intruder);
        let server = get_test_server(state);
        let budget = server
            .post(endpoints::BUDGETS)
            .authorization_bearer(&owner_token)
            .json(&json!({ "category": "Food", "limitAmount": 5000, "month": 10, "year": 2024 }))
            .await
            .json::<Budget>();
        let path = format_endpoint(endpoints::BUDGET, budget.id);

        server
            .get(&path)
            .authorization_bearer(&intruder_token)
            .await
            .assert_status_not_found();
        server
            .delete(&path)
            .authorization_bearer(&intruder_token)
            .await
            .assert_status_not_found();
        server
            .delete(&path)
            .authorization_bearer(&owner_token)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn list_requires_token() {
        let (state, _budget_checks) = get_test_state();
        let server = get_test_server(state);

        server
            .get(endpoints::BUDGETS)
            .await
            .assert_status_unauthorized();
    }
}
