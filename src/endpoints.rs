//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/budgets/{budget_id}', use [format_endpoint].

/// The route for checking that the server is up.
pub const HEALTH: &str = "/health";
/// The route for creating an account.
pub const REGISTER: &str = "/auth/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/auth/login";
/// The route to list and create budgets.
pub const BUDGETS: &str = "/budgets";
/// The route to access a single budget.
pub const BUDGET: &str = "/budgets/{budget_id}";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/transactions/{transaction_id}";
/// The route to delete all of a user's transactions.
pub const ALL_TRANSACTIONS: &str = "/transactions/all";
/// The route to upload CSV files for importing transactions.
pub const IMPORT_TRANSACTIONS: &str = "/transactions/upload";
/// The route for registering a browser for push notifications.
pub const SUBSCRIBE: &str = "/notifications/subscribe";
/// The route for getting the key push messages are signed with.
pub const VAPID_PUBLIC_KEY: &str = "/notifications/vapid-public-key";
/// The route for aggregate statistics across all users.
pub const ADMIN_STATS: &str = "/admin/stats";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::HEALTH);
        assert_endpoint_is_valid_uri(endpoints::REGISTER);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN);
        assert_endpoint_is_valid_uri(endpoints::BUDGETS);
        assert_endpoint_is_valid_uri(endpoints::BUDGET);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::ALL_TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::IMPORT_TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::SUBSCRIBE);
        assert_endpoint_is_valid_uri(endpoints::VAPID_PUBLIC_KEY);
        assert_endpoint_is_valid_uri(endpoints::ADMIN_STATS);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint(endpoints::BUDGET, 1);

        assert_eq!(formatted_path, "/budgets/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        let formatted_path = format_endpoint(endpoints::TRANSACTION, 42);

        assert_eq!(formatted_path, "/transactions/42");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint(endpoints::TRANSACTIONS, 1);

        assert_eq!(formatted_path, "/transactions");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
