use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Asset key is empty")]
    EmptyKey,

    #[error("Invalid asset key: {0:?}")]
    InvalidKey(String),

    #[error("Duplicated asset key: {0}")]
    DuplicateKey(String),

    #[error("Asset key not found: {0}")]
    NotFound(String),

    #[error("Buffer is empty")]
    EmptyBuffer,

    #[error("Buffer truncated: {0}")]
    Truncated(&'static str),

    #[error("Package base filename is empty")]
    EmptyFileName,

    #[error("Package is not open")]
    NotOpen,

    #[error("Unsupported package format tag: {0}")]
    UnsupportedFormat(u32),

    #[error("Corrupt metadata file: {0}")]
    CorruptMetadata(String),

    #[error("Asset has zero original size: {0}")]
    ZeroSizeAsset(String),

    #[error("Short read from bundle file: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Compression failed: {0}")]
    Compress(String),

    #[error("Decompression failed: {0}")]
    Decompress(String),

    #[error("Asset checksum verification failed: {key} (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch {
        key: String,
        stored: u32,
        computed: u32,
    },

    #[error("Written size mismatch: expected {expected} bytes, wrote {actual}")]
    WriteSizeCheck { expected: u64, actual: u64 },

    #[error("Bundle file would exceed the 32-bit offset range")]
    BundleTooLarge,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    /// True when the failure means "no such asset" rather than a broken package
    pub fn is_not_found(&self) -> bool {
        matches!(self, PackageError::NotFound(_) | PackageError::ZeroSizeAsset(_))
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
