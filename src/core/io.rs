//! Disk I/O for the two files backing a package

use crate::error::Result;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Metadata file extension
pub const METADATA_FILE_EXT: &str = ".eph";

/// Bundle file extension
pub const BUNDLE_FILE_EXT: &str = ".epb";

/// Suffix of the scratch file used for atomic metadata rewrites
const TEMP_SUFFIX: &str = ".tmp";

/// Append a suffix to a path without treating it as an extension swap
pub fn with_suffix<P: AsRef<Path>>(base: P, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_ref().as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn open_rw<P: AsRef<Path>>(path: P, truncate: bool) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(truncate)
        .truncate(truncate)
        .open(path)?;
    Ok(file)
}

/// Flush a directory entry change (such as a rename) inside `path`'s parent
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

// Directories cannot be opened as files here
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// The small, wholesale-rewritten metadata file
pub struct MetadataFile {
    file: File,
    path: PathBuf,
}

impl MetadataFile {
    /// Create (or truncate) a metadata file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(MetadataFile {
            file: open_rw(&path, true)?,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing metadata file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(MetadataFile {
            file: open_rw(&path, false)?,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Read the whole file
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Replace the whole file with `bytes`
    ///
    /// With `atomic` set the new contents go to a sibling scratch file that
    /// is synced and renamed over the old one, so a crash leaves either the
    /// old or the new image. Otherwise the file is rewritten in place.
    pub fn write_all(&mut self, bytes: &[u8], atomic: bool) -> Result<()> {
        if atomic {
            let temp_path = with_suffix(&self.path, TEMP_SUFFIX);
            {
                let mut temp = open_rw(&temp_path, true)?;
                temp.write_all(bytes)?;
                temp.sync_all()?;
            }
            fs::rename(&temp_path, &self.path)?;
            sync_parent_dir(&self.path)?;
            self.file = open_rw(&self.path, false)?;
        } else {
            self.file.seek(SeekFrom::Start(0))?;
            self.file.write_all(bytes)?;
            self.file.set_len(bytes.len() as u64)?;
            self.file.flush()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The append-only payload file
pub struct BundleFile {
    file: File,
    path: PathBuf,
}

impl BundleFile {
    /// Create (or truncate) a bundle file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(BundleFile {
            file: open_rw(&path, true)?,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing bundle file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(BundleFile {
            file: open_rw(&path, false)?,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Current length in bytes
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Append a run at the end of the file, returning its offset
    pub fn append(&mut self, data: &[u8], sync: bool) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(offset)
    }

    /// Positional read of up to `size` bytes
    ///
    /// Returns the buffer (always `size` long) and how many bytes were
    /// actually read before end of file.
    pub fn read_at(&mut self, offset: u64, size: usize) -> Result<(Vec<u8>, usize)> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok((buffer, filled))
    }

    /// Read the whole file
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Replace the whole file with `bytes` in place
    pub fn rewrite(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(bytes)?;
        self.file.set_len(bytes.len() as u64)?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
