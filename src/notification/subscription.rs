//! The browser push endpoints users register to receive notifications.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, UserID};

/// One browser's push channel and the keys used to encrypt messages for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// The push service URL. Unique across all users.
    pub endpoint: String,
    /// The user the endpoint delivers to.
    pub user_id: UserID,
    /// The browser's P-256 public key, base64url encoded.
    pub p256dh: String,
    /// The browser's authentication secret, base64url encoded.
    pub auth: String,
}

/// Create the push subscription table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_push_subscription_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS push_subscription (
                endpoint TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                p256dh TEXT NOT NULL,
                auth TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_push_subscription_user_id
            ON push_subscription(user_id);",
        (),
    )?;

    Ok(())
}

fn map_subscription_row(row: &Row) -> Result<PushSubscription, rusqlite::Error> {
    Ok(PushSubscription {
        endpoint: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        p256dh: row.get(2)?,
        auth: row.get(3)?,
    })
}

/// Store `subscription`, replacing the owner and keys if the endpoint is already known.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn upsert_push_subscription(
    subscription: &PushSubscription,
    connection: &Connection,
) -> Result<PushSubscription, Error> {
    connection
        .prepare(
            "INSERT INTO push_subscription (endpoint, user_id, p256dh, auth)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(endpoint) DO UPDATE SET
                user_id = excluded.user_id,
                p256dh = excluded.p256dh,
                auth = excluded.auth
             RETURNING endpoint, user_id, p256dh, auth",
        )?
        .query_row(
            (
                &subscription.endpoint,
                subscription.user_id.as_i64(),
                &subscription.p256dh,
                &subscription.auth,
            ),
            map_subscription_row,
        )
        .map_err(Error::from)
}

/// Get every push endpoint registered for `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn get_push_subscriptions(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<PushSubscription>, Error> {
    connection
        .prepare(
            "SELECT endpoint, user_id, p256dh, auth FROM push_subscription
             WHERE user_id = ?1
             ORDER BY endpoint",
        )?
        .query_map((user_id.as_i64(),), map_subscription_row)?
        .map(|maybe_subscription| maybe_subscription.map_err(Error::from))
        .collect()
}

/// Delete the subscription for `endpoint` if it still belongs to `user_id`.
///
/// Returns whether a row was deleted. The owner check stops a stale delivery
/// from removing an endpoint that has since been registered by someone else.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn delete_push_subscription(
    endpoint: &str,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .execute(
            "DELETE FROM push_subscription WHERE endpoint = ?1 AND user_id = ?2",
            (endpoint, user_id.as_i64()),
        )
        .map(|deleted| deleted > 0)
        .map_err(Error::from)
}
