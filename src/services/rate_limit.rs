// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Fixed-window per-IP rate limiting for public form endpoints and login.

use crate::config::env_or;
use anyhow::{ensure, Result};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Form submissions allowed per IP per window
    pub max_requests: u32,
    pub window: Duration,
    /// Login attempts allowed per IP per window
    pub login_max_attempts: u32,
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
            login_max_attempts: 10,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Self {
            max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?,
            window: Duration::from_secs(env_or(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.window.as_secs(),
            )?),
            login_max_attempts: env_or("LOGIN_MAX_ATTEMPTS", defaults.login_max_attempts)?,
            sweep_interval: Duration::from_secs(env_or(
                "RATE_LIMIT_SWEEP_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
        }
        .validated()
    }

    /// Zero windows would admit nothing or spin the sweeper.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.window.is_zero(), "RATE_LIMIT_WINDOW_SECS must be greater than 0");
        ensure!(
            !self.sweep_interval.is_zero(),
            "RATE_LIMIT_SWEEP_SECS must be greater than 0"
        );
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter keyed by client IP.
///
/// The first request from an IP opens a window; at most `max_requests` are
/// admitted until the window has fully elapsed, after which the count resets.
pub struct RateLimiter {
    name: &'static str,
    max_requests: u32,
    window: Duration,
    windows: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self {
            name,
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    /// Count one request from `ip`.
    ///
    /// Returns the time until the window resets when the limit is exhausted.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(entry.started));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        // Concurrent checks may insert while retaining
        before.saturating_sub(self.windows.len())
    }

    /// Number of IPs currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Periodically sweep expired windows until the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!(limiter = self.name, removed, "Swept expired rate-limit windows");
                }
            }
        })
    }
}

/// Whole seconds for a `Retry-After` header, never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}
