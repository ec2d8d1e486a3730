// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Configurator pricing: a small state reducer over the site's catalog of
//! site types, add-on modules and packages, plus the quote it produces.

use crate::models::configurator::{
    ConfiguratorData, Discount, Package, Quote, QuoteLine, Selection,
};
use crate::services::validation::MAX_PRICE_CENTS;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfiguratorError {
    #[error("Unknown site type '{0}'")]
    UnknownSiteType(String),

    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    #[error("Unknown tier '{tier}' for module '{module}'")]
    UnknownTier { module: String, tier: String },

    #[error("Unknown package '{0}'")]
    UnknownPackage(String),

    #[error("No site type selected")]
    NoSiteType,

    #[error("Configurator needs at least one site type")]
    NoSiteTypes,

    #[error("Duplicate {list} id '{id}'")]
    DuplicateId { list: &'static str, id: String },

    #[error("Package '{package}' references unknown module '{module}'")]
    UnknownPackageModule { package: String, module: String },

    #[error("Package '{package}' has a discount outside 0..=100 percent")]
    PercentOutOfRange { package: String },

    #[error("Price of '{0}' must be between 0 and {max} cents", max = MAX_PRICE_CENTS)]
    PriceOutOfRange(String),

    #[error("Quote total is too large")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectSiteType(String),
    /// Select the module, or deselect it when already selected
    ToggleModule(String),
    /// Select the module with the given tier
    SelectTier { module_id: String, tier_id: String },
    /// Select a package together with its modules, or clear the package
    SelectPackage(Option<String>),
    Reset,
}

/// Wizard state bound to one site's configurator data.
///
/// Every action validates ids against the data first; a rejected action
/// leaves the state untouched.
#[derive(Debug, Clone)]
pub struct ConfiguratorState<'a> {
    data: &'a ConfiguratorData,
    site_type: Option<String>,
    /// Selected module id -> chosen tier id
    modules: BTreeMap<String, Option<String>>,
    package: Option<String>,
}

impl<'a> ConfiguratorState<'a> {
    pub fn new(data: &'a ConfiguratorData) -> Self {
        Self {
            data,
            site_type: None,
            modules: BTreeMap::new(),
            package: None,
        }
    }

    pub fn site_type(&self) -> Option<&str> {
        self.site_type.as_deref()
    }

    pub fn is_selected(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id)
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn apply(&mut self, action: Action) -> Result<(), ConfiguratorError> {
        match action {
            Action::SelectSiteType(id) => {
                if !self.data.site_types.iter().any(|t| t.id == id) {
                    return Err(ConfiguratorError::UnknownSiteType(id));
                }
                self.site_type = Some(id);
            }
            Action::ToggleModule(id) => {
                if !self.data.modules.iter().any(|m| m.id == id) {
                    return Err(ConfiguratorError::UnknownModule(id));
                }
                if self.modules.remove(&id).is_none() {
                    self.modules.insert(id, None);
                }
            }
            Action::SelectTier { module_id, tier_id } => {
                let module = self
                    .data
                    .modules
                    .iter()
                    .find(|m| m.id == module_id)
                    .ok_or_else(|| ConfiguratorError::UnknownModule(module_id.clone()))?;
                if !module.tiers.iter().any(|t| t.id == tier_id) {
                    return Err(ConfiguratorError::UnknownTier {
                        module: module_id,
                        tier: tier_id,
                    });
                }
                self.modules.insert(module_id, Some(tier_id));
            }
            Action::SelectPackage(None) => self.package = None,
            Action::SelectPackage(Some(id)) => {
                let package = self.find_package(&id)?;
                for module_id in &package.module_ids {
                    self.modules.entry(module_id.clone()).or_insert(None);
                }
                self.package = Some(id);
            }
            Action::Reset => {
                self.site_type = None;
                self.modules.clear();
                self.package = None;
            }
        }
        Ok(())
    }

    fn find_package(&self, id: &str) -> Result<&'a Package, ConfiguratorError> {
        self.data
            .packages
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ConfiguratorError::UnknownPackage(id.to_string()))
    }

    /// Price the current state. Module lines follow the catalog order.
    pub fn quote(&self) -> Result<Quote, ConfiguratorError> {
        let site_type_id = self.site_type.as_ref().ok_or(ConfiguratorError::NoSiteType)?;
        let site_type = self
            .data
            .site_types
            .iter()
            .find(|t| &t.id == site_type_id)
            .ok_or_else(|| ConfiguratorError::UnknownSiteType(site_type_id.clone()))?;

        let mut modules = Vec::with_capacity(self.modules.len());
        for module in &self.data.modules {
            let Some(tier_id) = self.modules.get(&module.id) else {
                continue;
            };
            let tier = tier_id
                .as_ref()
                .and_then(|tid| module.tiers.iter().find(|t| &t.id == tid));
            modules.push(QuoteLine {
                id: module.id.clone(),
                name: module.name.clone(),
                tier: tier.map(|t| t.name.clone()),
                price_cents: tier.map_or(module.price_cents, |t| t.price_cents),
            });
        }

        let base_cents = site_type.base_price_cents;
        let modules_cents = checked_sum(modules.iter().map(|m| m.price_cents))?;

        let discount_cents = match &self.package {
            Some(id) => {
                let package = self.find_package(id)?;
                let package_cents = checked_sum(
                    modules
                        .iter()
                        .filter(|m| package.module_ids.contains(&m.id))
                        .map(|m| m.price_cents),
                )?;
                discount_amount(package.discount, package_cents)?
            }
            None => 0,
        };
        let total_cents = base_cents
            .checked_add(modules_cents)
            .ok_or(ConfiguratorError::Overflow)?
            - discount_cents;

        Ok(Quote {
            site_type: QuoteLine {
                id: site_type.id.clone(),
                name: site_type.name.clone(),
                tier: None,
                price_cents: base_cents,
            },
            modules,
            package: self.package.clone(),
            base_cents,
            modules_cents,
            discount_cents,
            total_cents: total_cents.max(0),
        })
    }
}

fn checked_sum(mut cents: impl Iterator<Item = i64>) -> Result<i64, ConfiguratorError> {
    cents.try_fold(0i64, |sum, c| sum.checked_add(c).ok_or(ConfiguratorError::Overflow))
}

/// Percent rounds half up to whole cents; a fixed amount is capped at `amount_cents`.
fn discount_amount(discount: Discount, amount_cents: i64) -> Result<i64, ConfiguratorError> {
    let amount_cents = amount_cents.max(0);
    match discount {
        Discount::Percent(p) => amount_cents
            .checked_mul(i64::from(p))
            .and_then(|scaled| scaled.checked_add(50))
            .map(|scaled| scaled / 100)
            .ok_or(ConfiguratorError::Overflow),
        Discount::FixedCents(fixed) => Ok(fixed.clamp(0, amount_cents)),
    }
}

/// Replay a submitted selection through the reducer and price it.
///
/// The package goes first so explicit module choices can pick tiers for
/// modules the package selected.
pub fn quote_selection(
    data: &ConfiguratorData,
    selection: &Selection,
) -> Result<Quote, ConfiguratorError> {
    let mut state = ConfiguratorState::new(data);
    state.apply(Action::SelectSiteType(selection.site_type.clone()))?;
    if let Some(package) = &selection.package {
        state.apply(Action::SelectPackage(Some(package.clone())))?;
    }
    for choice in &selection.modules {
        match &choice.tier {
            Some(tier) => state.apply(Action::SelectTier {
                module_id: choice.id.clone(),
                tier_id: tier.clone(),
            })?,
            None if state.is_selected(&choice.id) => {}
            None => state.apply(Action::ToggleModule(choice.id.clone()))?,
        }
    }
    state.quote()
}

/// Check data before it is stored as the site's configurator.
pub fn validate_data(data: &ConfiguratorData) -> Result<(), ConfiguratorError> {
    if data.site_types.is_empty() {
        return Err(ConfiguratorError::NoSiteTypes);
    }

    unique_ids("site type", data.site_types.iter().map(|t| t.id.as_str()))?;
    unique_ids("module", data.modules.iter().map(|m| m.id.as_str()))?;
    unique_ids("package", data.packages.iter().map(|p| p.id.as_str()))?;

    for site_type in &data.site_types {
        price_in_range(&site_type.id, site_type.base_price_cents)?;
    }
    for module in &data.modules {
        price_in_range(&module.id, module.price_cents)?;
        unique_ids("tier", module.tiers.iter().map(|t| t.id.as_str()))?;
        for tier in &module.tiers {
            price_in_range(&format!("{}/{}", module.id, tier.id), tier.price_cents)?;
        }
    }

    for package in &data.packages {
        for module_id in &package.module_ids {
            if !data.modules.iter().any(|m| &m.id == module_id) {
                return Err(ConfiguratorError::UnknownPackageModule {
                    package: package.id.clone(),
                    module: module_id.clone(),
                });
            }
        }
        match package.discount {
            Discount::Percent(p) if p > 100 => {
                return Err(ConfiguratorError::PercentOutOfRange {
                    package: package.id.clone(),
                })
            }
            Discount::FixedCents(fixed) => price_in_range(&package.id, fixed)?,
            Discount::Percent(_) => {}
        }
    }

    Ok(())
}

fn unique_ids<'a>(
    list: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ConfiguratorError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ConfiguratorError::DuplicateId {
                list,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn price_in_range(id: &str, cents: i64) -> Result<(), ConfiguratorError> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ConfiguratorError::PriceOutOfRange(id.to_string()));
    }
    Ok(())
}
