//! Application router configuration.
//!
//! Every route apart from registration, log in, the VAPID key and the health
//! check requires a bearer token. Handlers enforce this themselves through the
//! [AuthUser](crate::auth::AuthUser) and [AdminUser](crate::auth::AdminUser)
//! extractors rather than through a route layer.

use axum::{
    Router,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::{
    AppState, Error,
    admin::admin_stats,
    auth::{log_in, register_user},
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
        list_budgets_endpoint, update_budget_endpoint,
    },
    csv_import::import_transactions_endpoint,
    endpoints,
    notification::{get_vapid_public_key, subscribe_endpoint},
    transaction::{
        create_transaction_endpoint, delete_all_transactions_endpoint,
        delete_transaction_endpoint, get_transaction_endpoint, list_transactions_endpoint,
        update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::VAPID_PUBLIC_KEY, get(get_vapid_public_key));

    let protected_routes = Router::new()
        .route(
            endpoints::BUDGETS,
            get(list_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint)
                .put(update_budget_endpoint)
                .patch(update_budget_endpoint)
                .delete(delete_budget_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::ALL_TRANSACTIONS,
            delete(delete_all_transactions_endpoint),
        )
        .route(
            endpoints::IMPORT_TRANSACTIONS,
            post(import_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .patch(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(endpoints::SUBSCRIBE, post(subscribe_endpoint))
        .route(endpoints::ADMIN_STATS, get(admin_stats));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Liveness check.
async fn get_health() -> StatusCode {
    StatusCode::OK
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
