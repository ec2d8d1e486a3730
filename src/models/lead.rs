// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Contact form submission forwarded to Telegram.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LeadRequest {
    /// Visitor name, 2 to 50 characters
    pub name: String,
    /// Phone number with 10 to 15 digits
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Page or widget the form was submitted from
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
}
