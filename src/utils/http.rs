// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::MailConfig;

const USER_AGENT: &str = concat!("storefront/", env!("CARGO_PKG_VERSION"));

/// Create the asynchronous HTTP client shared by the email API providers.
pub fn create_async_client(config: &MailConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.send_timeout_secs))
        .build()?;
    Ok(client)
}

/// Short, single-line excerpt of a response body for error messages.
pub fn body_excerpt(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 200 {
        let cut: String = flat.chars().take(200).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_defaults() {
        assert!(create_async_client(&MailConfig::default()).is_ok());
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(body_excerpt("  bad\n request  "), "bad request");
        let long = "x".repeat(500);
        assert_eq!(body_excerpt(&long).len(), 203);
    }
}
