//! Fans a notification out to every push endpoint a user has registered.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use futures::future::join_all;
use rusqlite::Connection;
use serde_json::Value;

use crate::{
    Error, UserID,
    notification::subscription::{
        PushSubscription, delete_push_subscription, get_push_subscriptions,
    },
};

/// Why a message could not be delivered to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The push service says the endpoint no longer exists (HTTP 404 or 410).
    Gone,
    /// Any other failure, such as a network error or a rejected message.
    Failed(String),
}

/// Sends an encrypted message to a single push endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Deliver `payload` to `subscription`.
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), DeliveryError>;
}

/// How a dispatch went, one count per endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Endpoints that accepted the message.
    pub delivered: usize,
    /// Endpoints that were gone and have been removed.
    pub pruned: usize,
    /// Endpoints that failed for any other reason and were kept.
    pub failed: usize,
}

/// Delivers JSON payloads to all of a user's push endpoints.
pub struct NotificationDispatcher<T> {
    db_connection: Arc<Mutex<Connection>>,
    transport: Arc<T>,
}

impl<T> Clone for NotificationDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            db_connection: self.db_connection.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T> Debug for NotificationDispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

impl<T: PushTransport> NotificationDispatcher<T> {
    /// Create a dispatcher that reads subscriptions from `db_connection` and sends with `transport`.
    pub fn new(db_connection: Arc<Mutex<Connection>>, transport: T) -> Self {
        Self {
            db_connection,
            transport: Arc::new(transport),
        }
    }

    /// Send `payload` to every endpoint registered for `user_id`.
    ///
    /// Deliveries run concurrently and fail independently. Endpoints that are
    /// gone are deleted, other failures are logged and left for next time.
    /// Nothing is retried and no error is returned to the caller.
    pub async fn send_to_user(&self, user_id: UserID, payload: &Value) -> DispatchSummary {
        let subscriptions = match self.load_subscriptions(user_id) {
            Ok(subscriptions) => subscriptions,
            Err(error) => {
                tracing::error!("could not load push subscriptions for user {user_id}: {error}");
                return DispatchSummary::default();
            }
        };

        if subscriptions.is_empty() {
            tracing::debug!("No push subscriptions found for user {user_id}");
            return DispatchSummary::default();
        }

        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(error) => {
                tracing::error!("could not serialize push payload: {error}");
                return DispatchSummary::default();
            }
        };

        let body = &body;
        let results = join_all(subscriptions.iter().map(|subscription| async move {
            let result = self.transport.deliver(subscription, body).await;
            (subscription, result)
        }))
        .await;

        let mut summary = DispatchSummary::default();

        for (subscription, result) in results {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(DeliveryError::Gone) => {
                    tracing::info!(
                        "Removing expired push subscription: {}",
                        subscription.endpoint
                    );

                    match self.prune(subscription) {
                        Ok(_) => summary.pruned += 1,
                        Err(error) => {
                            tracing::error!(
                                "could not remove push subscription {}: {error}",
                                subscription.endpoint
                            );
                            summary.failed += 1;
                        }
                    }
                }
                Err(DeliveryError::Failed(reason)) => {
                    tracing::error!(
                        "Error sending push notification to endpoint {}: {reason}",
                        subscription.endpoint
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    fn load_subscriptions(&self, user_id: UserID) -> Result<Vec<PushSubscription>, Error> {
        let connection = self
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_push_subscriptions(user_id, &connection)
    }

    fn prune(&self, subscription: &PushSubscription) -> Result<bool, Error> {
        let connection = self
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        delete_push_subscription(&subscription.endpoint, subscription.user_id, &connection)
    }
}
