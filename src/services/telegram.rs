// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Telegram Bot API client and the notification messages it sends.

use crate::config::{env_opt, env_or};
use crate::models::booking::Booking;
use crate::models::cart::OrderWithItems;
use crate::models::configurator::Quote;
use crate::services::template::TextTemplate;
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat used when the site has no `telegram_chat_id` setting
    pub default_chat_id: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    /// Returns `None` when `TELEGRAM_BOT_TOKEN` is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(bot_token) = env_opt("TELEGRAM_BOT_TOKEN") else {
            return Ok(None);
        };

        Ok(Some(Self {
            bot_token,
            default_chat_id: env_opt("TELEGRAM_CHAT_ID")
                .context("TELEGRAM_CHAT_ID must be set when TELEGRAM_BOT_TOKEN is set")?,
            api_base: env_opt("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(env_or("TELEGRAM_TIMEOUT_SECS", 10)?),
        }))
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn default_chat_id(&self) -> &str {
        &self.config.default_chat_id
    }

    /// Post `text` to `chat_id` through `sendMessage`.
    ///
    /// Errors never include the request URL, which carries the bot token.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        );

        let response = self
            .http
            .post(url)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .map_err(|e| anyhow!("Telegram request failed: {}", e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Telegram returned {status}: {body}");
        }

        tracing::debug!(chat_id, "Telegram message delivered");
        Ok(())
    }
}

// ============================================================================
// Message formatting
// ============================================================================

const LEAD_TEMPLATE: TextTemplate =
    TextTemplate::new(include_str!("../../templates/telegram/lead.txt"));
const ORDER_TEMPLATE: TextTemplate =
    TextTemplate::new(include_str!("../../templates/telegram/order.txt"));
const BOOKING_TEMPLATE: TextTemplate =
    TextTemplate::new(include_str!("../../templates/telegram/booking.txt"));
const CONFIGURATOR_TEMPLATE: TextTemplate =
    TextTemplate::new(include_str!("../../templates/telegram/configurator.txt"));

/// `12345` → `123.45`
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

/// Contact details of a lead, already validated and normalized.
pub struct LeadMessage<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub message: Option<&'a str>,
    pub source: Option<&'a str>,
}

pub fn format_lead(site: &str, lead: &LeadMessage<'_>) -> String {
    LEAD_TEMPLATE.render(&[
        ("site", site),
        ("name", lead.name),
        ("phone", lead.phone),
        ("source", or_dash(lead.source)),
        ("message", or_dash(lead.message)),
    ])
}

pub fn format_order(site: &str, order: &OrderWithItems) -> String {
    let lines = order
        .items
        .iter()
        .map(|item| {
            format!(
                "{} x{} = {}",
                item.product_name,
                item.quantity,
                format_money(item.price_cents.saturating_mul(item.quantity))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    ORDER_TEMPLATE.render(&[
        ("order_id", &order.order.id.to_string()),
        ("site", site),
        ("name", &order.order.customer_name),
        ("phone", &order.order.phone),
        ("address", or_dash(order.order.address.as_deref())),
        ("comment", or_dash(order.order.comment.as_deref())),
        ("lines", &lines),
        ("total", &format_money(order.order.total_cents)),
    ])
}

pub fn format_booking(site: &str, booking: &Booking) -> String {
    BOOKING_TEMPLATE.render(&[
        ("booking_id", &booking.id.to_string()),
        ("site", site),
        ("name", &booking.name),
        ("phone", &booking.phone),
        ("service", &booking.service),
        ("date", &booking.booking_date.format("%Y-%m-%d").to_string()),
        ("time", &booking.booking_time),
        ("comment", or_dash(booking.comment.as_deref())),
    ])
}

pub fn format_configurator(
    site: &str,
    name: &str,
    phone: &str,
    comment: Option<&str>,
    quote: &Quote,
) -> String {
    let mut lines = vec![format!(
        "{}: {}",
        quote.site_type.name,
        format_money(quote.site_type.price_cents)
    )];
    for module in &quote.modules {
        let label = match &module.tier {
            Some(tier) => format!("{} ({tier})", module.name),
            None => module.name.clone(),
        };
        lines.push(format!("+ {label}: {}", format_money(module.price_cents)));
    }

    let discount = match &quote.package {
        Some(package) => format!("{} ({package})", format_money(quote.discount_cents)),
        None => format_money(quote.discount_cents),
    };

    CONFIGURATOR_TEMPLATE.render(&[
        ("site", site),
        ("name", name),
        ("phone", phone),
        ("comment", or_dash(comment)),
        ("lines", &lines.join("\n")),
        ("discount", &discount),
        ("total", &format_money(quote.total_cents)),
    ])
}
