// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Tracing setup and anonymization of personal data in log lines.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));
    // A second init (tests, embedding) keeps the first subscriber
    let _ = fmt().with_env_filter(filter).try_init();
}

/// Anonymize an email address for logging.
/// Shows first character and domain, hides the rest: "a***@example.com"
pub fn anonymize_email(email: &str) -> String {
    if let Some((local, domain)) = email.split_once('@') {
        if local.is_empty() {
            return format!("***@{}", domain);
        }
        let first = local.chars().next().unwrap_or('*');
        format!("{}***@{}", first, domain)
    } else {
        // Invalid email format, redact completely
        "***@***".to_string()
    }
}

/// Anonymize a phone number for logging, keeping only the last two digits.
pub fn anonymize_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return "***".to_string();
    }
    let tail: String = digits[digits.len() - 2..].iter().collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymize_email() {
        assert_eq!(anonymize_email("alice@example.com"), "a***@example.com");
        assert_eq!(anonymize_email("bob@test.org"), "b***@test.org");
    }

    #[test]
    fn test_anonymize_email_empty_local() {
        assert_eq!(anonymize_email("@example.com"), "***@example.com");
    }

    #[test]
    fn test_anonymize_email_no_at() {
        assert_eq!(anonymize_email("notanemail"), "***@***");
    }

    #[test]
    fn test_anonymize_phone() {
        assert_eq!(anonymize_phone("+7 (912) 345-67-89"), "***89");
        assert_eq!(anonymize_phone("12"), "***");
    }
}
