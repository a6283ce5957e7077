//! Transactional-email HTTP API (MailerSend).
//!
//! Accepted messages come back as `202 Accepted` with an empty body; the
//! message id is carried in the `x-message-id` header.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{ApiProviderConfig, Order};
use crate::notify::message::{self, Branding, OrderEmail, split_sender};
use crate::notify::{Notifier, SendOutcome};
use crate::utils::http::body_excerpt;

const NAME: &str = "mailersend";
const DEFAULT_BASE_URL: &str = "https://api.mailersend.com";
const MESSAGE_ID_HEADER: &str = "x-message-id";

pub struct MailerSendProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    sender_name: String,
    sender_email: String,
    base_url: String,
    branding: Branding,
}

impl MailerSendProvider {
    pub fn new(config: &ApiProviderConfig, branding: Branding, client: reqwest::Client) -> Self {
        let base_url = if config.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };
        let (name, email) = split_sender(&config.sender);
        let api_key = if email.is_empty() && config.api_key.is_some() {
            log::warn!("{} has an API key but no sender address", NAME);
            None
        } else {
            config.api_key.clone()
        };

        Self {
            client,
            api_key,
            sender_name: name.unwrap_or_else(|| branding.brand.clone()),
            sender_email: email,
            base_url,
            branding,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/email", self.base_url)
    }

    pub fn payload(&self, email: &OrderEmail) -> Value {
        json!({
            "from": {
                "email": self.sender_email,
                "name": self.sender_name,
            },
            "to": [{
                "email": email.to,
                "name": "Customer",
            }],
            "subject": email.subject,
            "text": email.text,
            "html": email.html,
        })
    }

    async fn try_send(&self, api_key: &str, email: &OrderEmail) -> Result<Option<String>> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::provider(
                NAME,
                format!("HTTP {}: {}", status.as_u16(), body_excerpt(&body)),
            ));
        }

        Ok(response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}

#[async_trait]
impl Notifier for MailerSendProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, order: &Order, download_url: &str) -> SendOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return SendOutcome::not_configured(NAME);
        };

        let email = message::render(order, download_url, &self.branding);
        match self.try_send(api_key, &email).await {
            Ok(id) => SendOutcome::sent(id),
            Err(e) => SendOutcome::failed(e),
        }
    }
}
