//! Delivers push messages through the browser vendors' push services.
//!
//! Messages are encrypted with `aes128gcm` and signed with the server's VAPID key.

use async_trait::async_trait;
use web_push::{
    ContentEncoding, IsahcWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo,
    URL_SAFE_NO_PAD, VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use crate::{
    Error,
    notification::{
        dispatcher::{DeliveryError, PushTransport},
        subscription::PushSubscription,
    },
};

/// A [PushTransport] that sends real web push messages.
pub struct WebPushTransport {
    signer: PartialVapidSignatureBuilder,
    subject: String,
    client: IsahcWebPushClient,
}

impl WebPushTransport {
    /// Create a transport that signs with `vapid_private_key` and identifies as `subject`.
    ///
    /// `vapid_private_key` is the base64url encoded P-256 private key and
    /// `subject` is a `mailto:` or `https:` contact for the push services.
    ///
    /// # Errors
    /// Returns [Error::PushConfiguration] if the key cannot be decoded or the HTTP client cannot be created.
    pub fn new(vapid_private_key: &str, subject: &str) -> Result<Self, Error> {
        let signer = VapidSignatureBuilder::from_base64_no_sub(vapid_private_key, URL_SAFE_NO_PAD)
            .map_err(|error| {
                Error::PushConfiguration(format!("invalid VAPID private key: {error}"))
            })?;

        let client = IsahcWebPushClient::new().map_err(|error| {
            Error::PushConfiguration(format!("could not create push client: {error}"))
        })?;

        Ok(Self {
            signer,
            subject: subject.to_owned(),
            client,
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let subscription_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.p256dh,
            &subscription.auth,
        );

        let mut signature_builder = self.signer.clone().add_sub_info(&subscription_info);
        signature_builder.add_claim("sub", self.subject.as_str());
        let signature = signature_builder.build().map_err(classify)?;

        let mut message_builder = WebPushMessageBuilder::new(&subscription_info);
        message_builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        message_builder.set_vapid_signature(signature);
        let message = message_builder.build().map_err(classify)?;

        self.client.send(message).await.map_err(classify)
    }
}

fn classify(error: WebPushError) -> DeliveryError {
    match error {
        WebPushError::EndpointNotValid { .. } | WebPushError::EndpointNotFound { .. } => {
            DeliveryError::Gone
        }
        other => DeliveryError::Failed(other.to_string()),
    }
}
