// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings key holding the configurator catalog.
pub const CONFIGURATOR_KEY: &str = "configurator";
/// Settings key overriding the Telegram chat for a site.
pub const TELEGRAM_CHAT_KEY: &str = "telegram_chat_id";

/// Keys with this prefix never appear in the public settings endpoint.
pub const PRIVATE_PREFIX: &str = "telegram_";

pub fn is_private_key(key: &str) -> bool {
    key.starts_with(PRIVATE_PREFIX)
}

/// Request to set a setting value
#[derive(Debug, Deserialize, Serialize)]
pub struct SetSettingRequest {
    pub value: Value,
}

/// Response for a single setting
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
}
