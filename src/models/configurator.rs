// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Catalog (stored per site under the `configurator` setting)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfiguratorData {
    pub site_types: Vec<SiteType>,
    #[serde(default)]
    pub modules: Vec<AddonModule>,
    #[serde(default)]
    pub packages: Vec<Package>,
}

/// Kind of site being ordered; fixes the base price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SiteType {
    pub id: String,
    pub name: String,
    pub base_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddonModule {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    /// Optional pricing tiers; a chosen tier replaces `price_cents`
    #[serde(default)]
    pub tiers: Vec<ModuleTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ModuleTier {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub module_ids: Vec<String>,
    pub discount: Discount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Discount {
    /// Percentage of the package's selected modules, 0..=100
    Percent(u8),
    /// Flat amount, capped at the package's selected modules
    FixedCents(i64),
}

// ============================================================================
// Selection and quote
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModuleChoice {
    pub id: String,
    #[serde(default)]
    pub tier: Option<String>,
}

/// What the visitor picked in the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Selection {
    pub site_type: String,
    #[serde(default)]
    pub modules: Vec<ModuleChoice>,
    #[serde(default)]
    pub package: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuoteLine {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub site_type: QuoteLine,
    pub modules: Vec<QuoteLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub base_cents: i64,
    pub modules_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// Configurator submission: the selection plus contact details.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmitConfigurationRequest {
    pub selection: Selection,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitConfigurationResponse {
    pub success: bool,
    pub quote: Quote,
}
