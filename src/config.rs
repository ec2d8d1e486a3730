// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Process-level configuration loaded from environment variables.
//!
//! Service-specific settings (auth, SMTP, Telegram, rate limits, uploads) live
//! next to the services that own them; this module only covers the server itself.

use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

/// Read an environment variable, falling back to `default` when it is unset.
///
/// A value that is set but does not parse is an error rather than a silent default.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

/// Read an optional, non-empty environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub default_site: String,
    /// Allowed CORS origins; empty means same-origin only.
    pub cors_origins: Vec<String>,
    /// Take the client IP from `X-Forwarded-For` (set when running behind a proxy).
    pub trust_proxy: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        let cors_origins = env_opt("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/site-admin.db".to_string()),
            default_site: env::var("DEFAULT_SITE").unwrap_or_else(|_| "default".to_string()),
            cors_origins,
            trust_proxy: env_or("TRUST_PROXY", false)?,
        })
    }
}
