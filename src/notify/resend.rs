//! Transactional-email HTTP API (Resend).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{ApiProviderConfig, Order};
use crate::notify::message::{self, Branding, OrderEmail};
use crate::notify::{Notifier, SendOutcome};
use crate::utils::http::body_excerpt;

const NAME: &str = "resend";
const DEFAULT_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

pub struct ResendProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    sender: String,
    base_url: String,
    branding: Branding,
}

impl ResendProvider {
    pub fn new(config: &ApiProviderConfig, branding: Branding, client: reqwest::Client) -> Self {
        let base_url = if config.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };
        let sender = if config.sender.trim().is_empty() {
            format!("{} <onboarding@resend.dev>", branding.brand)
        } else {
            config.sender.clone()
        };

        Self {
            client,
            api_key: config.api_key.clone(),
            sender,
            base_url,
            branding,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/emails", self.base_url)
    }

    pub fn payload(&self, email: &OrderEmail) -> Value {
        json!({
            "from": self.sender,
            "to": [email.to],
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

        let body: SendResponse = response.json().await?;
        Ok(body.id)
    }
}

#[async_trait]
impl Notifier for ResendProvider {
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
