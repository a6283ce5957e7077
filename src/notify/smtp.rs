//! SMTP relay transport (STARTTLS, authenticated).

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{Order, SmtpConfig};
use crate::notify::message::{self, Branding, OrderEmail};
use crate::notify::{Notifier, SendOutcome};

const NAME: &str = "smtp";

pub struct SmtpProvider {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Option<Mailbox>,
    branding: Branding,
}

impl SmtpProvider {
    pub fn new(config: &SmtpConfig, branding: Branding, timeout_secs: u64) -> Self {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Self {
                transport: None,
                sender: None,
                branding,
            };
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host) {
            Ok(builder) => Some(
                builder
                    .port(config.port)
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .timeout(Some(Duration::from_secs(timeout_secs)))
                    .build(),
            ),
            Err(e) => {
                log::warn!("{} relay {} is unusable: {}", NAME, config.host, e);
                None
            }
        };

        let sender_spec = config
            .sender
            .clone()
            .unwrap_or_else(|| format!("\"{}\" <{}>", branding.brand, username));
        let sender = match sender_spec.parse::<Mailbox>() {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                log::warn!("{} sender {:?} is invalid: {}", NAME, sender_spec, e);
                None
            }
        };

        Self {
            transport,
            sender,
            branding,
        }
    }

    /// Build the MIME message with plain-text and HTML alternatives.
    pub fn build_message(&self, sender: &Mailbox, email: &OrderEmail) -> Result<Message> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::provider(NAME, format!("invalid recipient: {e}")))?;

        Message::builder()
            .from(sender.clone())
            .to(to)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| AppError::provider(NAME, e))
    }

    async fn try_send(
        &self,
        transport: &AsyncSmtpTransport<Tokio1Executor>,
        sender: &Mailbox,
        email: &OrderEmail,
    ) -> Result<Option<String>> {
        let message = self.build_message(sender, email)?;
        let response = transport
            .send(message)
            .await
            .map_err(|e| AppError::provider(NAME, e))?;

        let reply = response.message().collect::<Vec<_>>().join(" ");
        Ok((!reply.is_empty()).then_some(reply))
    }
}

#[async_trait]
impl Notifier for SmtpProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.transport.is_some() && self.sender.is_some()
    }

    async fn send(&self, order: &Order, download_url: &str) -> SendOutcome {
        let (Some(transport), Some(sender)) = (&self.transport, &self.sender) else {
            return SendOutcome::not_configured(NAME);
        };

        let email = message::render(order, download_url, &self.branding);
        match self.try_send(transport, sender, &email).await {
            Ok(id) => SendOutcome::sent(id),
            Err(e) => SendOutcome::failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::message::tests::paid_order;

    fn configured() -> SmtpConfig {
        SmtpConfig {
            username: Some("shop@example.com".to_string()),
            password: Some("app-password".to_string()),
            ..SmtpConfig::default()
        }
    }

    #[tokio::test]
    async fn test_credentials_make_provider_available() {
        let provider = SmtpProvider::new(&configured(), Branding::default(), 10);
        assert!(provider.is_available());
        assert_eq!(
            provider.sender.as_ref().unwrap().email.to_string(),
            "shop@example.com"
        );
    }

    #[tokio::test]
    async fn test_missing_password_is_unavailable() {
        let mut config = configured();
        config.password = None;
        assert!(!SmtpProvider::new(&config, Branding::default(), 10).is_available());
    }

    #[tokio::test]
    async fn test_build_message() {
        let provider = SmtpProvider::new(&configured(), Branding::default(), 10);
        let sender = provider.sender.clone().unwrap();
        let email = message::render(&paid_order(), "https://x/r/abc", &provider.branding);

        let formatted = provider.build_message(&sender, &email).unwrap().formatted();
        let raw = String::from_utf8_lossy(&formatted);
        assert!(raw.contains("To: buyer@example.com"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_provider_error() {
        let provider = SmtpProvider::new(&configured(), Branding::default(), 10);
        let sender = provider.sender.clone().unwrap();
        let mut email = message::render(&paid_order(), "https://x/r/abc", &provider.branding);
        email.to = "not an address".to_string();

        let err = provider.build_message(&sender, &email).unwrap_err();
        assert!(matches!(err, AppError::Provider { .. }));
    }
}
