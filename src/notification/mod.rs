//! Web push notifications: storing browser endpoints and delivering messages to them.

mod dispatcher;
mod endpoints;
mod subscription;
mod web_push_transport;

pub use dispatcher::{DeliveryError, NotificationDispatcher, PushTransport};
pub use endpoints::{get_vapid_public_key, subscribe_endpoint};
pub use subscription::{PushSubscription, create_push_subscription_table};
pub use web_push_transport::WebPushTransport;

#[cfg(test)]
pub use subscription::upsert_push_subscription;
