//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Longest receiving link validity accepted from configuration.
pub const MAX_LINK_VALIDITY_DAYS: i64 = 3650;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP listener and public URL
    #[serde(default)]
    pub server: ServerConfig,

    /// Catalog folder layout
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Price derivation
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Receiving link and notification policy
    #[serde(default)]
    pub fulfillment: FulfillmentConfig,

    /// Payment confirmation authentication
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Outbound email providers
    #[serde(default)]
    pub mail: MailConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored so that a blank variable never wipes a
    /// value set in the config file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SITE_URL") {
            self.server.site_url = v;
        }
        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("Ignoring invalid PORT value {:?}", v),
            }
        }
        if let Some(v) = get("CATALOG_ROOT") {
            self.catalog.root = PathBuf::from(v);
        }
        if let Some(v) = get("PAYMENT_SECRET") {
            self.payment.secret = Some(v);
        }
        if let Some(v) = get("RESEND_API_KEY") {
            self.mail.resend.api_key = Some(v);
        }
        if let Some(v) = get("MAILERSEND_API_KEY") {
            self.mail.mailersend.api_key = Some(v);
        }
        if let Some(v) = get("EMAILJS_PUBLIC_KEY") {
            self.mail.emailjs.api_key = Some(v);
        }
        if let Some(v) = get("EMAILJS_SERVICE_ID") {
            self.mail.emailjs.service_id = Some(v);
        }
        if let Some(v) = get("EMAILJS_TEMPLATE_ID") {
            self.mail.emailjs.template_id = Some(v);
        }
        if let Some(v) = get("SMTP_HOST") {
            self.mail.smtp.host = v;
        }
        if let Some(v) = get("MAIL_USER") {
            self.mail.smtp.username = Some(v);
        }
        if let Some(v) = get("MAIL_PASS") {
            self.mail.smtp.password = Some(v);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.server.site_url)
            .map_err(|e| AppError::validation(format!("server.site_url is invalid: {e}")))?;
        if self.catalog.folder_prefix.trim().is_empty() {
            return Err(AppError::validation("catalog.folder_prefix is empty"));
        }
        if self.catalog.artifact_extension.trim().is_empty() {
            return Err(AppError::validation("catalog.artifact_extension is empty"));
        }
        if self.catalog.image_extensions.is_empty() {
            return Err(AppError::validation("catalog.image_extensions is empty"));
        }
        if self.catalog.scan_timeout_secs == 0 {
            return Err(AppError::validation("catalog.scan_timeout_secs must be > 0"));
        }
        if self.pricing.daily_discount_percent > 100 {
            return Err(AppError::validation(
                "pricing.daily_discount_percent must be <= 100",
            ));
        }
        if !(1..=MAX_LINK_VALIDITY_DAYS).contains(&self.fulfillment.link_validity_days) {
            return Err(AppError::validation(format!(
                "fulfillment.link_validity_days must be between 1 and {MAX_LINK_VALIDITY_DAYS}"
            )));
        }
        if self.fulfillment.max_notification_chains == 0 {
            return Err(AppError::validation(
                "fulfillment.max_notification_chains must be > 0",
            ));
        }
        if self.mail.providers.is_empty() {
            return Err(AppError::validation("mail.providers is empty"));
        }
        if self.mail.attempts_per_provider == 0 {
            return Err(AppError::validation("mail.attempts_per_provider must be > 0"));
        }
        if self.mail.send_timeout_secs == 0 {
            return Err(AppError::validation("mail.send_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    /// TCP port
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Externally visible base URL used in emailed links
    #[serde(default = "defaults::site_url")]
    pub site_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::bind_address(),
            port: defaults::port(),
            site_url: defaults::site_url(),
        }
    }
}

/// Catalog folder layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding one subdirectory per product
    #[serde(default = "defaults::catalog_root")]
    pub root: PathBuf,

    /// Two-letter prefix of valid product folder names
    #[serde(default = "defaults::folder_prefix")]
    pub folder_prefix: String,

    /// Extension of the deliverable artifact
    #[serde(default = "defaults::artifact_extension")]
    pub artifact_extension: String,

    /// Name of the product description file
    #[serde(default = "defaults::description_file")]
    pub description_file: String,

    /// Recognized raster image extensions (lowercase)
    #[serde(default = "defaults::image_extensions")]
    pub image_extensions: Vec<String>,

    /// Upper bound for a single catalog scan
    #[serde(default = "defaults::scan_timeout")]
    pub scan_timeout_secs: u64,

    /// Keep the first daily offer of the day even if the catalog changes
    #[serde(default = "defaults::pin_daily_offer")]
    pub pin_daily_offer: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: defaults::catalog_root(),
            folder_prefix: defaults::folder_prefix(),
            artifact_extension: defaults::artifact_extension(),
            description_file: defaults::description_file(),
            image_extensions: defaults::image_extensions(),
            scan_timeout_secs: defaults::scan_timeout(),
            pin_daily_offer: defaults::pin_daily_offer(),
        }
    }
}

/// Price derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Constant price per product
    #[serde(default = "defaults::unit_price")]
    pub unit_price: u32,

    /// Discount applied when buying today's offer
    #[serde(default = "defaults::daily_discount_percent")]
    pub daily_discount_percent: u32,

    /// Currency label used in emails
    #[serde(default = "defaults::currency")]
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            unit_price: defaults::unit_price(),
            daily_discount_percent: defaults::daily_discount_percent(),
            currency: defaults::currency(),
        }
    }
}

/// Receiving link and notification policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    /// Validity window of a receiving link
    #[serde(default = "defaults::link_validity_days")]
    pub link_validity_days: i64,

    /// Path prefix of the buyer-facing receiving page
    #[serde(default = "defaults::receiving_path")]
    pub receiving_path: String,

    /// Maximum number of full provider chains per order
    #[serde(default = "defaults::max_notification_chains")]
    pub max_notification_chains: u32,

    /// Interval of the background retry sweep, 0 disables it
    #[serde(default = "defaults::sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            link_validity_days: defaults::link_validity_days(),
            receiving_path: defaults::receiving_path(),
            max_notification_chains: defaults::max_notification_chains(),
            sweep_interval_secs: defaults::sweep_interval(),
        }
    }
}

/// Payment confirmation settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentConfig {
    /// Shared secret for confirmation signatures; unsigned when absent
    #[serde(default)]
    pub secret: Option<String>,
}

/// Identifies a transport provider variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Resend,
    MailerSend,
    EmailJs,
    Smtp,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Resend => "resend",
            ProviderKind::MailerSend => "mailersend",
            ProviderKind::EmailJs => "emailjs",
            ProviderKind::Smtp => "smtp",
        }
    }
}

/// Outbound email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Providers in failover order
    #[serde(default = "defaults::providers")]
    pub providers: Vec<ProviderKind>,

    /// Tries per provider before moving to the next one
    #[serde(default = "defaults::attempts_per_provider")]
    pub attempts_per_provider: u32,

    /// Pause between tries against the same provider
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,

    /// Timeout of a single provider call
    #[serde(default = "defaults::send_timeout")]
    pub send_timeout_secs: u64,

    /// Brand shown in subject lines and footers
    #[serde(default = "defaults::brand")]
    pub brand: String,

    /// Support link included in emails
    #[serde(default = "defaults::support_url")]
    pub support_url: String,

    #[serde(default = "defaults::resend")]
    pub resend: ApiProviderConfig,

    #[serde(default = "defaults::mailersend")]
    pub mailersend: ApiProviderConfig,

    #[serde(default)]
    pub emailjs: EmailJsConfig,

    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            providers: defaults::providers(),
            attempts_per_provider: defaults::attempts_per_provider(),
            retry_delay_ms: defaults::retry_delay(),
            send_timeout_secs: defaults::send_timeout(),
            brand: defaults::brand(),
            support_url: defaults::support_url(),
            resend: defaults::resend(),
            mailersend: defaults::mailersend(),
            emailjs: EmailJsConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// Settings shared by HTTP-API providers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiProviderConfig {
    /// Bearer token; the provider is unavailable without it
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sender identity, `Name <address>`
    #[serde(default)]
    pub sender: String,

    /// API endpoint root
    #[serde(default)]
    pub base_url: String,
}

/// Template-based HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJsConfig {
    /// Public key, sent as user id and access token
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub service_id: Option<String>,

    #[serde(default)]
    pub template_id: Option<String>,

    #[serde(default = "defaults::emailjs_base_url")]
    pub base_url: String,
}

impl Default for EmailJsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            service_id: None,
            template_id: None,
            base_url: defaults::emailjs_base_url(),
        }
    }
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "defaults::smtp_host")]
    pub host: String,

    #[serde(default = "defaults::smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender identity; defaults to the username address
    #[serde(default)]
    pub sender: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: defaults::smtp_host(),
            port: defaults::smtp_port(),
            username: None,
            password: None,
            sender: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{ApiProviderConfig, ProviderKind};

    // Server defaults
    pub fn bind_address() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        3000
    }
    pub fn site_url() -> String {
        "http://localhost:3000".into()
    }

    // Catalog defaults
    pub fn catalog_root() -> PathBuf {
        PathBuf::from("public/watch")
    }
    pub fn folder_prefix() -> String {
        "KF".into()
    }
    pub fn artifact_extension() -> String {
        "apk".into()
    }
    pub fn description_file() -> String {
        "description.txt".into()
    }
    pub fn image_extensions() -> Vec<String> {
        ["jpg", "jpeg", "png", "gif", "webp"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
    pub fn scan_timeout() -> u64 {
        10
    }
    pub fn pin_daily_offer() -> bool {
        true
    }

    // Pricing defaults
    pub fn unit_price() -> u32 {
        150
    }
    pub fn daily_discount_percent() -> u32 {
        20
    }
    pub fn currency() -> String {
        "руб.".into()
    }

    // Fulfillment defaults
    pub fn link_validity_days() -> i64 {
        30
    }
    pub fn receiving_path() -> String {
        "/purchase/receiving/".into()
    }
    pub fn max_notification_chains() -> u32 {
        5
    }
    pub fn sweep_interval() -> u64 {
        300
    }

    // Mail defaults
    pub fn providers() -> Vec<ProviderKind> {
        vec![
            ProviderKind::Resend,
            ProviderKind::MailerSend,
            ProviderKind::EmailJs,
            ProviderKind::Smtp,
        ]
    }
    pub fn attempts_per_provider() -> u32 {
        2
    }
    pub fn retry_delay() -> u64 {
        500
    }
    pub fn send_timeout() -> u64 {
        15
    }
    pub fn brand() -> String {
        "KF WATCH FACE".into()
    }
    pub fn support_url() -> String {
        "https://t.me/krek_free".into()
    }
    pub fn resend() -> ApiProviderConfig {
        ApiProviderConfig {
            api_key: None,
            sender: "KF WATCH FACE <onboarding@resend.dev>".into(),
            base_url: "https://api.resend.com".into(),
        }
    }
    pub fn mailersend() -> ApiProviderConfig {
        ApiProviderConfig {
            api_key: None,
            sender: "KF WATCH FACE <noreply@kf-watch-face.example>".into(),
            base_url: "https://api.mailersend.com".into(),
        }
    }
    pub fn emailjs_base_url() -> String {
        "https://api.emailjs.com".into()
    }
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        587
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_site_url() {
        let mut config = Config::default();
        config.server.site_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_provider_list() {
        let mut config = Config::default();
        config.mail.providers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_discount_over_hundred() {
        let mut config = Config::default();
        config.pricing.daily_discount_percent = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_link_validity() {
        let mut config = Config::default();
        for days in [0, -1, MAX_LINK_VALIDITY_DAYS + 1, i64::MAX] {
            config.fulfillment.link_validity_days = days;
            assert!(config.validate().is_err(), "{days} days accepted");
        }
        config.fulfillment.link_validity_days = MAX_LINK_VALIDITY_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [mail]
            providers = ["smtp", "resend"]

            [mail.resend]
            api_key = "re_123"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.site_url, "http://localhost:3000");
        assert_eq!(
            config.mail.providers,
            vec![ProviderKind::Smtp, ProviderKind::Resend]
        );
        assert_eq!(config.mail.resend.api_key.as_deref(), Some("re_123"));
        assert_eq!(config.pricing.unit_price, 150);
        assert_eq!(config.fulfillment.link_validity_days, 30);
    }

    #[test]
    fn env_overrides_fill_credentials() {
        let env: HashMap<&str, &str> = [
            ("SITE_URL", "https://shop.example"),
            ("PORT", "9000"),
            ("RESEND_API_KEY", "re_abc"),
            ("MAIL_USER", "shop@example.com"),
            ("MAIL_PASS", "secret"),
            ("MAILERSEND_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.site_url, "https://shop.example");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.mail.resend.api_key.as_deref(), Some("re_abc"));
        assert_eq!(config.mail.smtp.username.as_deref(), Some("shop@example.com"));
        assert!(config.mail.mailersend.api_key.is_none());
    }

    #[test]
    fn load_or_default_falls_back() {
        let config = Config::load_or_default("/definitely/not/here.toml");
        assert_eq!(config.catalog.folder_prefix, "KF");
    }
}
