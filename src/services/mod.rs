// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod auth;
pub mod auth_db;
pub mod auth_middleware;
pub mod blog_db;
pub mod booking_db;
pub mod cart_db;
pub mod catalog_db;
pub mod configurator;
pub mod content_db;
pub mod db;
pub mod email;
pub mod logging;
pub mod newsletter_db;
pub mod rate_limit;
pub mod settings_db;
pub mod storage;
pub mod telegram;
pub mod template;
pub mod validation;
