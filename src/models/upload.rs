// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde::{Deserialize, Serialize};

/// Response after storing an uploaded file
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file_name: String,
    /// Public URL under `/uploads`
    pub url: String,
    pub size: u64,
}
