//! The routes browsers use to sign up for push notifications.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::AuthUser,
    notification::subscription::{PushSubscription, upsert_push_subscription},
};

/// The state needed to manage push subscriptions.
#[derive(Debug, Clone)]
pub struct NotificationState {
    /// The database connection for storing subscriptions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The base64url encoded public key browsers need to subscribe.
    pub vapid_public_key: String,
}

impl FromRef<AppState> for NotificationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            vapid_public_key: state.vapid_public_key.clone(),
        }
    }
}

/// The encryption keys from a browser's `PushSubscription`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionKeys {
    /// The browser's P-256 public key.
    pub p256dh: String,
    /// The browser's authentication secret.
    pub auth: String,
}

/// A browser `PushSubscription` serialized with `JSON.stringify`.
///
/// Unknown fields such as `expirationTime` are ignored since browsers include them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscribeRequest {
    /// The push service URL.
    pub endpoint: String,
    /// The encryption keys.
    pub keys: SubscriptionKeys,
}

impl SubscribeRequest {
    /// Check the request and attach it to `user`.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the endpoint is not an HTTP(S) URL or a key is empty.
    pub fn validate(self, user: AuthUser) -> Result<PushSubscription, Error> {
        let endpoint = self.endpoint.trim();

        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(Error::Validation(format!(
                "endpoint \"{endpoint}\" must be an HTTP(S) URL"
            )));
        }

        if self.keys.p256dh.trim().is_empty() || self.keys.auth.trim().is_empty() {
            return Err(Error::Validation(
                "keys.p256dh and keys.auth must not be empty".to_owned(),
            ));
        }

        Ok(PushSubscription {
            endpoint: endpoint.to_owned(),
            user_id: user.id,
            p256dh: self.keys.p256dh.trim().to_owned(),
            auth: self.keys.auth.trim().to_owned(),
        })
    }
}

/// A human readable confirmation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// The confirmation.
    pub message: String,
}

/// The key browsers pass to `pushManager.subscribe`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    /// The base64url encoded public key.
    pub public_key: String,
}

/// A route handler for registering a browser's push endpoint for the logged in user.
///
/// Subscribing with an endpoint that is already registered moves it to the caller.
pub async fn subscribe_endpoint(
    State(state): State<NotificationState>,
    user: AuthUser,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), Error> {
    let Json(request) = payload?;
    let subscription = request.validate(user)?;

    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    upsert_push_subscription(&subscription, &connection)?;
    tracing::info!("Saved push subscription for user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Subscription saved successfully.".to_owned(),
        }),
    ))
}

/// A route handler for getting the server's VAPID public key.
pub async fn get_vapid_public_key(
    State(state): State<NotificationState>,
) -> Json<VapidPublicKeyResponse> {
    Json(VapidPublicKeyResponse {
        public_key: state.vapid_public_key,
    })
}

#[cfg(test)]
mod endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        endpoints,
        notification::subscription::get_push_subscriptions,
        test_utils::{
            TEST_VAPID_PUBLIC_KEY, bearer_token, create_test_user_in, get_test_server,
            get_test_state,
        },
    };

    #[tokio::test]
    async fn subscribe_stores_endpoint() {
        let (state, _budget_checks) = get_test_state();
        let user = create_test_user_in(&state, "jane@example.com");
        let token = bearer_token(&state, &user);
        let db_connection = state.db_connection.clone();
        let server = get_test_server(state);

        let response = server
            .post(endpoints::SUBSCRIBE)
            .authorization_bearer(&token)
            .json(&json!({
                "endpoint": "https://push.example/abc",
                "expirationTime": null,
                "keys": { "p256dh": "p256dh-key", "auth": "auth-secret" }
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        response.assert_json(&json!({ "message": "Subscription saved successfully." }));
        let subscriptions = get_push_subscriptions(user.id, &db_connection.lock().unwrap()).unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].endpoint, "https://push.example/abc");
    }

    #[tokio::test]
    async fn subscribe_rejects_missing_keys() {
        let (state, _budget_checks) = get_test_state();
        let user = create_test_user_in(&state, "jane@example.com");
        let token = bearer_token(&state, &user);
        let server = get_test_server(state);

        server
            .post(endpoints::SUBSCRIBE)
            .authorization_bearer(&token)
            .json(&json!({ "endpoint": "https://push.example/abc" }))
            .await
            .assert_status_bad_request();
        server
            .post(endpoints::SUBSCRIBE)
            .authorization_bearer(&token)
            .json(&json!({
                "endpoint": "https://push.example/abc",
                "keys": { "p256dh": "", "auth": "auth-secret" }
            }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn vapid_key_is_public() {
        let (state, _budget_checks) = get_test_state();
        let server = get_test_server(state);

        let response = server.get(endpoints::VAPID_PUBLIC_KEY).await;

        response.assert_status_ok();
        response.assert_json(&json!({ "publicKey": TEST_VAPID_PUBLIC_KEY }));
    }
}
