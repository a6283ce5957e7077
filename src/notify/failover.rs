//! Ordered provider chain with bounded retries.
//!
//! Each provider gets `attempts_per_provider` tries, each bounded by the send
//! timeout. Unavailable providers are skipped without an attempt. The chain
//! stops at the first success; running out of providers is reported, never
//! retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Config, MailConfig, Order};
use crate::notify::{Notifier, SendOutcome, providers_from_config};

/// Retry bounds of a chain.
#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    pub attempts_per_provider: u32,
    pub retry_delay: Duration,
    pub send_timeout: Duration,
}

impl From<&MailConfig> for FailoverPolicy {
    fn from(config: &MailConfig) -> Self {
        Self {
            attempts_per_provider: config.attempts_per_provider.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }
}

/// One failed try against one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    pub provider: String,
    pub attempt: u32,
    pub error: String,
}

/// Result of running the whole chain once.
#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    /// Provider that accepted the message
    pub delivered_by: Option<String>,
    pub message_id: Option<String>,
    pub failures: Vec<FailedAttempt>,
    /// Providers skipped for missing configuration
    pub skipped: Vec<String>,
}

impl ChainReport {
    pub fn is_delivered(&self) -> bool {
        self.delivered_by.is_some()
    }

    /// Short description of why the chain did not deliver.
    pub fn last_error(&self) -> String {
        match self.failures.last() {
            Some(f) => format!("{}: {}", f.provider, f.error),
            None if self.skipped.is_empty() => "no mail providers configured".to_string(),
            None => format!("no available provider (skipped: {})", self.skipped.join(", ")),
        }
    }
}

/// Notifier that walks providers in order until one succeeds.
pub struct FailoverNotifier {
    providers: Vec<Arc<dyn Notifier>>,
    policy: FailoverPolicy,
}

impl FailoverNotifier {
    pub fn new(providers: Vec<Arc<dyn Notifier>>, policy: FailoverPolicy) -> Self {
        Self { providers, policy }
    }

    /// Build the chain from the `mail` configuration section.
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = providers_from_config(config)?
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn Notifier>)
            .collect();
        Ok(Self::new(providers, FailoverPolicy::from(&config.mail)))
    }

    /// Names of providers that can currently send.
    pub fn available(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name())
            .collect()
    }

    /// Run the chain once for an order.
    pub async fn deliver(&self, order: &Order, download_url: &str) -> ChainReport {
        let mut report = ChainReport::default();

        for provider in &self.providers {
            if !provider.is_available() {
                log::debug!("Skipping unavailable provider {}", provider.name());
                report.skipped.push(provider.name().to_string());
                continue;
            }

            for attempt in 1..=self.policy.attempts_per_provider {
                let outcome = match tokio::time::timeout(
                    self.policy.send_timeout,
                    provider.send(order, download_url),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => SendOutcome::failed(format!(
                        "timed out after {}s",
                        self.policy.send_timeout.as_secs()
                    )),
                };

                if outcome.success {
                    log::info!(
                        "Order {} notification sent via {} (message id: {})",
                        order.order_id,
                        provider.name(),
                        outcome.message_id.as_deref().unwrap_or("-")
                    );
                    report.delivered_by = Some(provider.name().to_string());
                    report.message_id = outcome.message_id;
                    return report;
                }

                let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
                log::warn!(
                    "Order {} notification via {} failed (attempt {}/{}): {}",
                    order.order_id,
                    provider.name(),
                    attempt,
                    self.policy.attempts_per_provider,
                    error
                );
                report.failures.push(FailedAttempt {
                    provider: provider.name().to_string(),
                    attempt,
                    error,
                });

                if attempt < self.policy.attempts_per_provider && !self.policy.retry_delay.is_zero()
                {
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }

        report
    }
}

#[async_trait]
impl Notifier for FailoverNotifier {
    fn name(&self) -> &str {
        "failover"
    }

    fn is_available(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    async fn send(&self, order: &Order, download_url: &str) -> SendOutcome {
        let report = self.deliver(order, download_url).await;
        if report.is_delivered() {
            SendOutcome::sent(report.message_id)
        } else {
            SendOutcome::failed(report.last_error())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::notify::message::tests::paid_order;

    /// Notifier double that replays a fixed script of outcomes.
    pub(crate) struct ScriptedNotifier {
        name: String,
        available: bool,
        script: Mutex<VecDeque<bool>>,
        default_success: bool,
        delay: Duration,
        pub(crate) calls: AtomicU32,
    }

    impl ScriptedNotifier {
        pub(crate) fn new(name: &str, script: &[bool], default_success: bool) -> Self {
            Self {
                name: name.to_string(),
                available: true,
                script: Mutex::new(script.iter().copied().collect()),
                default_success,
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn always(name: &str, success: bool) -> Self {
            Self::new(name, &[], success)
        }

        pub(crate) fn unavailable(name: &str) -> Self {
            Self {
                available: false,
                ..Self::always(name, true)
            }
        }

        pub(crate) fn slow(name: &str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::always(name, true)
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn send(&self, _order: &Order, _download_url: &str) -> SendOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let success = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.default_success);
            if success {
                SendOutcome::sent(Some(format!("{}-id", self.name)))
            } else {
                SendOutcome::failed(format!("{} rejected the message", self.name))
            }
        }
    }

    pub(crate) fn policy(attempts: u32) -> FailoverPolicy {
        FailoverPolicy {
            attempts_per_provider: attempts,
            retry_delay: Duration::ZERO,
            send_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let first = Arc::new(ScriptedNotifier::always("first", true));
        let second = Arc::new(ScriptedNotifier::always("second", true));
        let chain = FailoverNotifier::new(vec![first.clone(), second.clone()], policy(2));

        let report = chain.deliver(&paid_order(), "https://x").await;
        assert_eq!(report.delivered_by.as_deref(), Some("first"));
        assert_eq!(report.message_id.as_deref(), Some("first-id"));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_retries_then_falls_over() {
        let flaky = Arc::new(ScriptedNotifier::always("flaky", false));
        let backup = Arc::new(ScriptedNotifier::always("backup", true));
        let chain = FailoverNotifier::new(vec![flaky.clone(), backup.clone()], policy(3));

        let report = chain.deliver(&paid_order(), "https://x").await;
        assert_eq!(report.delivered_by.as_deref(), Some("backup"));
        assert_eq!(flaky.calls(), 3);
        assert_eq!(report.failures.len(), 3);
    }

    #[tokio::test]
    async fn test_second_attempt_can_succeed() {
        let flaky = Arc::new(ScriptedNotifier::new("flaky", &[false, true], false));
        let chain = FailoverNotifier::new(vec![flaky.clone()], policy(2));

        let report = chain.deliver(&paid_order(), "https://x").await;
        assert!(report.is_delivered());
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_providers_are_skipped() {
        let missing = Arc::new(ScriptedNotifier::unavailable("missing"));
        let working = Arc::new(ScriptedNotifier::always("working", true));
        let chain = FailoverNotifier::new(vec![missing.clone(), working.clone()], policy(1));

        assert_eq!(chain.available(), vec!["working"]);
        let report = chain.deliver(&paid_order(), "https://x").await;
        assert_eq!(report.skipped, vec!["missing".to_string()]);
        assert_eq!(missing.calls(), 0);
        assert!(report.is_delivered());
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_failure() {
        let a = Arc::new(ScriptedNotifier::always("a", false));
        let b = Arc::new(ScriptedNotifier::always("b", false));
        let chain = FailoverNotifier::new(vec![a, b], policy(1));

        let outcome = chain.send(&paid_order(), "https://x").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("b: b rejected the message"));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let slow = Arc::new(ScriptedNotifier::slow("slow", Duration::from_secs(60)));
        let fast = Arc::new(ScriptedNotifier::always("fast", true));
        let mut policy = policy(1);
        policy.send_timeout = Duration::from_millis(20);
        let chain = FailoverNotifier::new(vec![slow, fast], policy);

        let report = chain.deliver(&paid_order(), "https://x").await;
        assert_eq!(report.delivered_by.as_deref(), Some("fast"));
        assert!(report.failures[0].error.contains("timed out"));
    }

    #[test]
    fn test_empty_chain_message() {
        assert_eq!(
            ChainReport::default().last_error(),
            "no mail providers configured"
        );
    }
}
