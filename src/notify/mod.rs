//! Buyer notification.
//!
//! A [`Notifier`] sends the "order paid" email for one order through one
//! transport. [`Provider`] is the closed set of transports the storefront
//! ships with; [`FailoverNotifier`] walks an ordered list of them.
//!
//! Providers never fail past their own boundary: every error, including a
//! missing configuration, comes back as an unsuccessful [`SendOutcome`].

pub mod emailjs;
pub mod failover;
pub mod mailersend;
pub mod message;
pub mod resend;
pub mod smtp;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Config, Order, ProviderKind};

pub use emailjs::EmailJsProvider;
pub use failover::{ChainReport, FailoverNotifier, FailoverPolicy};
pub use mailersend::MailerSendProvider;
pub use message::{Branding, OrderEmail};
pub use resend::ResendProvider;
pub use smtp::SmtpProvider;

/// Structured result of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.to_string()),
        }
    }

    pub fn not_configured(provider: &str) -> Self {
        Self::failed(format!("{provider} is not configured"))
    }
}

/// Capability of sending the order notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the required credentials are present.
    fn is_available(&self) -> bool;

    async fn send(&self, order: &Order, download_url: &str) -> SendOutcome;
}

/// Built-in transport providers.
pub enum Provider {
    Resend(ResendProvider),
    MailerSend(MailerSendProvider),
    EmailJs(EmailJsProvider),
    Smtp(SmtpProvider),
}

impl Provider {
    /// Build a provider from configuration.
    ///
    /// Missing credentials are logged and leave the provider unavailable.
    pub fn from_config(
        kind: ProviderKind,
        config: &Config,
        client: &reqwest::Client,
    ) -> Self {
        let branding = Branding::from_config(config);
        let provider = match kind {
            ProviderKind::Resend => Provider::Resend(ResendProvider::new(
                &config.mail.resend,
                branding,
                client.clone(),
            )),
            ProviderKind::MailerSend => Provider::MailerSend(MailerSendProvider::new(
                &config.mail.mailersend,
                branding,
                client.clone(),
            )),
            ProviderKind::EmailJs => Provider::EmailJs(EmailJsProvider::new(
                &config.mail.emailjs,
                branding,
                client.clone(),
            )),
            ProviderKind::Smtp => Provider::Smtp(SmtpProvider::new(
                &config.mail.smtp,
                branding,
                config.mail.send_timeout_secs,
            )),
        };

        if provider.is_available() {
            log::info!("Mail provider {} configured", kind.as_str());
        } else {
            log::warn!(
                "Mail provider {} is not configured and will be skipped",
                kind.as_str()
            );
        }
        provider
    }

    fn inner(&self) -> &dyn Notifier {
        match self {
            Provider::Resend(p) => p,
            Provider::MailerSend(p) => p,
            Provider::EmailJs(p) => p,
            Provider::Smtp(p) => p,
        }
    }
}

#[async_trait]
impl Notifier for Provider {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn is_available(&self) -> bool {
        self.inner().is_available()
    }

    async fn send(&self, order: &Order, download_url: &str) -> SendOutcome {
        self.inner().send(order, download_url).await
    }
}

/// Build every configured provider in failover order.
pub fn providers_from_config(config: &Config) -> Result<Vec<Provider>> {
    let client = crate::utils::http::create_async_client(&config.mail)?;
    Ok(config
        .mail
        .providers
        .iter()
        .map(|kind| Provider::from_config(*kind, config, &client))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::message::tests::paid_order;

    #[tokio::test]
    async fn test_unconfigured_providers_report_instead_of_failing() {
        let providers = providers_from_config(&Config::default()).unwrap();
        assert_eq!(providers.len(), 4);

        for provider in &providers {
            assert!(!provider.is_available());
            let outcome = provider.send(&paid_order(), "https://x/y").await;
            assert!(!outcome.success);
            assert!(outcome.error.unwrap().contains("not configured"));
        }
    }

    #[test]
    fn test_provider_names_follow_config_order() {
        let mut config = Config::default();
        config.mail.providers = vec![ProviderKind::Smtp, ProviderKind::Resend];
        config.mail.resend.api_key = Some("re_test".to_string());

        let providers = providers_from_config(&config).unwrap();
        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["smtp", "resend"]);
        assert!(providers[1].is_available());
    }
}
