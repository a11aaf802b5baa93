//! Asset versions packed from modification times
//!
//! A version derived from a file's modification time packs the local
//! calendar time into 32 bits:
//!
//! ```text
//! bits  0..4   minute / 4   (4-minute buckets)
//! bits  4..9   hour         (0-23)
//! bits  9..14  day of month (1-31)
//! bits 14..18  month        (0-11)
//! bits 18..32  year - 2010
//! ```
//!
//! Decoding gives the start of the 4-minute bucket, not the exact time.

use crate::error::Result;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use std::path::Path;

/// First year representable in a packed version
pub const BASE_YEAR: i32 = 2010;

/// Width of one minute bucket
pub const MINUTE_STEP: u32 = 4;

/// How an asset's version is chosen when it is added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetVersion {
    /// Store this value as-is
    Explicit(u32),
    /// Pack the source file's modification time
    FileTime,
}

impl From<u32> for AssetVersion {
    fn from(version: u32) -> Self {
        AssetVersion::Explicit(version)
    }
}

/// Pack a calendar time into a version number
pub fn pack_version(time: &NaiveDateTime) -> u32 {
    let year = (time.year() - BASE_YEAR).max(0) as u32;
    (time.minute() / MINUTE_STEP)
        | (time.hour() << 4)
        | (time.day() << 9)
        | (time.month0() << 14)
        | (year << 18)
}

/// Unpack a version number into the start of its 4-minute bucket
///
/// Returns `None` for values that do not name a real calendar time, such as
/// explicit versions that were never packed from a date.
pub fn unpack_version(version: u32) -> Option<NaiveDateTime> {
    let minute = (version & 0xf) * MINUTE_STEP;
    let hour = (version >> 4) & 0x1f;
    let day = (version >> 9) & 0x1f;
    let month0 = (version >> 14) & 0xf;
    let year = BASE_YEAR + (version >> 18) as i32;

    NaiveDate::from_ymd_opt(year, month0 + 1, day)?.and_hms_opt(hour, minute, 0)
}

/// Version packed from a file's local modification time
pub fn version_from_file_time<P: AsRef<Path>>(path: P) -> Result<u32> {
    let modified = std::fs::metadata(path)?.modified()?;
    let local: DateTime<Local> = modified.into();
    Ok(pack_version(&local.naive_local()))
}
