// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Deserializer};

pub mod auth;
pub mod blog;
pub mod booking;
pub mod cart;
pub mod catalog;
pub mod common;
pub mod configurator;
pub mod content;
pub mod lead;
pub mod newsletter;
pub mod settings;
pub mod upload;
pub mod version;

/// Distinguish an absent field from an explicit `null` in PATCH bodies.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: absent gives
/// `None`, `null` gives `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
