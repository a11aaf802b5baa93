//! Asset package core
//!
//! - [`error`] - Error types for package operations
//! - [`name_list`] - Registry of asset keys
//! - [`header_map`] - Per-asset header records
//! - [`header`] - Metadata file layout
//! - [`compression`] - DEFLATE codec and checksums
//! - [`io`] - Metadata and bundle file access
//! - [`version`] - Versions packed from modification times
//! - [`package`] - The package store

pub mod compression;
pub mod error;
pub mod header;
pub mod header_map;
pub mod io;
pub mod name_list;
pub mod package;
pub mod version;

pub use error::{PackageError, Result};
pub use header::{MetadataHeader, FORMAT_TAG};
pub use header_map::{HeaderIndex, HeaderRecord};
pub use name_list::NameRegistry;
pub use package::{CompactionStats, PackageStore};
pub use version::AssetVersion;
