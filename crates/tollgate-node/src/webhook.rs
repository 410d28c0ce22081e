//! Webhook delivery of deposit-detection notices.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tollgate_engine::{NotificationDispatcher, NotifyError, PaymentNotice};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs each notice as JSON to a configured receiver. When a secret is
/// configured, the exact request body is signed with HMAC-SHA256 and the
/// hex digest is sent as `X-Webhook-Signature` so receivers can authenticate
/// the sender.
pub struct WebhookDispatcher {
    http: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(url: String, secret: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self { http, url, secret })
    }
}

/// Hex HMAC-SHA256 digest of `body` under `secret`.
fn sign_body(secret: &[u8], body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, notice: &PaymentNotice) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(notice)
            .map_err(|e| NotifyError::Delivery(format!("encoding notice: {}", e)))?;

        let mut request = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header("X-Webhook-Signature", sign_body(secret.as_bytes(), &body));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "receiver returned {}",
                response.status()
            )));
        }
        tracing::debug!(address = %notice.address, url = %self.url, "webhook delivered");
        Ok(())
    }
}
