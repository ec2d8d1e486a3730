// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Input validation shared by the route handlers.
//!
//! Every function either returns the normalized value or an `ApiError::BadRequest`
//! naming the offending field.

use crate::error::{ApiError, ApiResult};
use std::str::FromStr;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const PHONE_MIN_DIGITS: usize = 10;
pub const PHONE_MAX_DIGITS: usize = 15;
pub const MESSAGE_MAX_CHARS: usize = 1000;
/// Upper bound for any single stored amount (ten billion in major units).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000_000;

/// Site keys: 1-64 chars of `[a-z0-9_-]`, starting with a letter or digit.
pub fn is_valid_site_key(site: &str) -> bool {
    is_valid_key(site, 64, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
    })
}

/// Cart ids are chosen by the client: 1-64 chars of `[A-Za-z0-9_-]`.
pub fn validate_cart_id(cart_id: &str) -> ApiResult<()> {
    let ok = !cart_id.is_empty()
        && cart_id.len() <= 64
        && cart_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid cart id"))
    }
}

/// Setting keys: 1-64 chars of `[a-z0-9_.-]`, starting with a letter or digit.
pub fn validate_setting_key(key: &str) -> ApiResult<()> {
    let ok = is_valid_key(key, 64, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' || c == '.'
    });
    if ok {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Invalid setting key '{key}'")))
    }
}

fn is_valid_key(key: &str, max_len: usize, allowed: impl Fn(char) -> bool) -> bool {
    let Some(first) = key.chars().next() else {
        return false;
    };
    key.len() <= max_len && first.is_ascii_alphanumeric() && key.chars().all(allowed)
}

/// Trim a person's name and check its length in characters.
pub fn normalize_name(name: &str) -> ApiResult<String> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "Name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a phone number and return it as `+digits` or `digits`.
///
/// Only digits, a leading `+`, spaces, parentheses and dashes are accepted.
pub fn normalize_phone(phone: &str) -> ApiResult<String> {
    let trimmed = phone.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    if !rest
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '(' | ')' | '-'))
    {
        return Err(ApiError::bad_request("Phone contains invalid characters"));
    }

    let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len()) {
        return Err(ApiError::bad_request(format!(
            "Phone must contain between {PHONE_MIN_DIGITS} and {PHONE_MAX_DIGITS} digits"
        )));
    }

    Ok(if plus { format!("+{digits}") } else { digits })
}

/// Validate an email address with the same parser the mailer uses.
pub fn normalize_email(email: &str) -> ApiResult<String> {
    let trimmed = email.trim();
    lettre::Address::from_str(trimmed)
        .map(|_| trimmed.to_lowercase())
        .map_err(|_| ApiError::bad_request("Invalid email address"))
}

/// Optional email: blank strings count as absent.
pub fn normalize_optional_email(email: Option<&str>) -> ApiResult<Option<String>> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(e) => normalize_email(e).map(Some),
        None => Ok(None),
    }
}

pub fn require_text(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn max_chars(field: &str, value: Option<&str>, max: usize) -> ApiResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

pub fn non_negative(field: &str, value: i64) -> ApiResult<()> {
    if value < 0 {
        return Err(ApiError::bad_request(format!("{field} cannot be negative")));
    }
    Ok(())
}

pub fn price_cents(field: &str, value: i64) -> ApiResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&value) {
        return Err(ApiError::bad_request(format!(
            "{field} must be between 0 and {MAX_PRICE_CENTS}"
        )));
    }
    Ok(())
}

/// Absolute http(s) URL.
pub fn validate_http_url(field: &str, value: &str) -> ApiResult<()> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => {
            Ok(())
        }
        _ => Err(ApiError::bad_request(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

/// Image or document reference: an uploaded file path or an absolute http(s) URL.
pub fn validate_media_url(field: &str, value: &str) -> ApiResult<()> {
    if value.starts_with("/uploads/") && !value.contains("..") {
        return Ok(());
    }
    validate_http_url(field, value)
}

/// Lowercase alphanumerics; every other run of characters collapses to one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Use the explicit slug when given, otherwise derive one from `source`.
pub fn resolve_slug(explicit: Option<&str>, source: &str) -> ApiResult<String> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => slugify(s),
        None => slugify(source),
    };
    if slug.is_empty() {
        return Err(ApiError::bad_request("Could not derive a slug"));
    }
    Ok(slug)
}
