// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Local file storage for admin uploads, one directory per site.

use crate::config::{env_opt, env_or};
use anyhow::Result;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "svg", "pdf"];

/// Public path prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("data/uploads"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            upload_dir: env_opt("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_bytes: env_or("UPLOAD_MAX_BYTES", defaults.max_bytes)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File type not allowed; expected one of: {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedType,

    #[error("File exceeds the {max_bytes} byte limit")]
    TooLarge { max_bytes: usize },

    #[error("Invalid file name")]
    InvalidName,

    #[error("File not found")]
    NotFound,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct StorageClient {
    root: PathBuf,
    max_bytes: usize,
}

impl StorageClient {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            root: config.upload_dir,
            max_bytes: config.max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Save `bytes` as `{root}/{site}/{uuid-v7}.{ext}`.
    ///
    /// The extension comes from the client's file name and must be whitelisted;
    /// the rest of that name is discarded.
    pub async fn store(
        &self,
        site: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let ext = allowed_extension(original_name).ok_or(StorageError::UnsupportedType)?;
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }

        let dir = self.root.join(site);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{ext}", Uuid::now_v7());
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        tracing::info!(site, file = %file_name, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            url: public_url(site, &file_name),
            file_name,
            size: bytes.len() as u64,
        })
    }

    /// Remove a previously stored file of `site`.
    pub async fn delete(&self, site: &str, file_name: &str) -> Result<(), StorageError> {
        if !is_plain_file_name(file_name) || allowed_extension(file_name).is_none() {
            return Err(StorageError::InvalidName);
        }

        match tokio::fs::remove_file(self.root.join(site).join(file_name)).await {
            Ok(()) => {
                tracing::info!(site, file = %file_name, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn public_url(site: &str, file_name: &str) -> String {
    format!("{PUBLIC_PREFIX}/{site}/{file_name}")
}

/// Lowercased extension of `file_name` if it is on the whitelist.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// A single path component that cannot escape its directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}
