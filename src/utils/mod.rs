//! Utility functions and helpers.

pub mod http;

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Lowercased extension of a file name without the dot.
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Content type served for a file extension.
pub fn content_type(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "json" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "apk" => "application/vnd.android.package-archive",
        _ => "application/octet-stream",
    }
}

/// Whether a user-supplied name is a single, plain path component.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Loose structural check of an email address.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let re = EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());
    email.len() <= 254 && re.as_ref().is_some_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Preview.PNG"), "png");
        assert_eq!(file_extension("face.apk"), "apk");
        assert_eq!(file_extension("README"), "");
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("jpeg"), "image/jpeg");
        assert_eq!(content_type("zip"), "application/octet-stream");
    }

    #[test]
    fn test_safe_component() {
        assert!(is_safe_component("KF001"));
        assert!(is_safe_component("01 preview.png"));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("../etc"));
        assert!(!is_safe_component("a\\b"));
        assert!(!is_safe_component(""));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("buyer@example.com"));
        assert!(!is_valid_email("buyer@example"));
        assert!(!is_valid_email("buyer example@x.com"));
        assert!(!is_valid_email(""));
    }
}
