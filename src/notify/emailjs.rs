//! Template-based HTTP API (EmailJS).
//!
//! The provider renders the email from a stored template, so only the
//! template variables are sent. The API returns no message id.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{EmailJsConfig, Order};
use crate::notify::message::{self, Branding};
use crate::notify::{Notifier, SendOutcome};
use crate::utils::http::body_excerpt;

const NAME: &str = "emailjs";

/// Credentials required for a send.
#[derive(Debug, Clone)]
struct Credentials {
    public_key: String,
    service_id: String,
    template_id: String,
}

pub struct EmailJsProvider {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    base_url: String,
    branding: Branding,
}

impl EmailJsProvider {
    pub fn new(config: &EmailJsConfig, branding: Branding, client: reqwest::Client) -> Self {
        let credentials = match (&config.api_key, &config.service_id, &config.template_id) {
            (Some(key), Some(service), Some(template)) => Some(Credentials {
                public_key: key.clone(),
                service_id: service.clone(),
                template_id: template.clone(),
            }),
            (None, None, None) => None,
            _ => {
                log::warn!(
                    "{} needs a public key, service id and template id; some are missing",
                    NAME
                );
                None
            }
        };

        Self {
            client,
            credentials,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            branding,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/v1.0/email/send", self.base_url)
    }

    fn payload(&self, credentials: &Credentials, order: &Order, download_url: &str) -> Value {
        json!({
            "service_id": credentials.service_id,
            "template_id": credentials.template_id,
            "user_id": credentials.public_key,
            "accessToken": credentials.public_key,
            "template_params": message::template_params(order, download_url, &self.branding),
        })
    }

    async fn try_send(
        &self,
        credentials: &Credentials,
        order: &Order,
        download_url: &str,
    ) -> Result<Option<String>> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.payload(credentials, order, download_url))
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

        Ok(Some(format!("emailjs-{}", Utc::now().timestamp_millis())))
    }
}

#[async_trait]
impl Notifier for EmailJsProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send(&self, order: &Order, download_url: &str) -> SendOutcome {
        let Some(credentials) = &self.credentials else {
            return SendOutcome::not_configured(NAME);
        };

        match self.try_send(credentials, order, download_url).await {
            Ok(id) => SendOutcome::sent(id),
            Err(e) => SendOutcome::failed(e),
        }
    }
}
