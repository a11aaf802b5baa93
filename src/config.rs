//! Package store configuration
//!
//! Loaded from TOML or built in code. Every field has a default, so an empty
//! document is a valid configuration:
//!
//! ```toml
//! compression_level = 9
//! verify_checksums = true
//! atomic_metadata = true
//! sync_on_write = false
//! ```

use crate::core::compression::{DEFAULT_LEVEL, MAX_LEVEL};
use crate::core::error::{PackageError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// DEFLATE level used when adding assets (0-9)
    pub compression_level: u32,

    /// Check the stored CRC-32 of each compressed run on read
    pub verify_checksums: bool,

    /// Rewrite the metadata file through a synced temp file and a rename
    pub atomic_metadata: bool,

    /// fsync the bundle file after every appended asset
    pub sync_on_write: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        PackageConfig {
            compression_level: DEFAULT_LEVEL,
            verify_checksums: true,
            atomic_metadata: true,
            sync_on_write: false,
        }
    }
}

impl PackageConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PackageConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression_level > MAX_LEVEL {
            return Err(PackageError::InvalidConfig(format!(
                "compression_level must be 0-{}, got {}",
                MAX_LEVEL, self.compression_level
            )));
        }
        Ok(())
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_atomic_metadata(mut self, atomic: bool) -> Self {
        self.atomic_metadata = atomic;
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }
}
