//! Modification time handling.
//!
//! Entry modification times are exposed as 32-bit seconds since the Unix
//! epoch. On disk a ZIP entry carries two representations:
//!
//! - the MS-DOS date/time pair in the local and central headers
//!   (2-second resolution, years 1980..=2107), interpreted here as UTC
//! - an optional extended-timestamp extra field (`0x5455`) with the exact
//!   32-bit value, which this crate writes for every entry it encodes
//!
//! Wider clocks are truncated, never rejected:
//!
//! ```rust
//! use zipsession::timestamp::{DosDateTime, truncate_epoch};
//!
//! let mtime = truncate_epoch(1_700_000_000);
//! let dos = DosDateTime::from_epoch(mtime);
//! assert_eq!(dos.to_epoch(), 1_700_000_000);
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

/// Earliest instant an MS-DOS timestamp can express (1980-01-01T00:00:00Z).
pub const DOS_EPOCH: u32 = 315_532_800;

const SECONDS_PER_DAY: i64 = 86_400;

/// An MS-DOS date/time pair as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    /// Packed date: `(year - 1980) << 9 | month << 5 | day`.
    pub date: u16,
    /// Packed time: `hour << 11 | minute << 5 | second / 2`.
    pub time: u16,
}

impl DosDateTime {
    /// Creates a pair from raw header fields.
    pub fn new(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// Converts epoch seconds (UTC) into the DOS representation.
    ///
    /// Times before 1980 clamp to 1980-01-01; odd seconds round down.
    pub fn from_epoch(secs: u32) -> Self {
        let secs = secs.max(DOS_EPOCH) as i64;
        let days = secs.div_euclid(SECONDS_PER_DAY);
        let rem = secs.rem_euclid(SECONDS_PER_DAY);
        let (year, month, day) = civil_from_days(days);

        let year = (year - 1980).clamp(0, 127) as u16;
        let hour = (rem / 3600) as u16;
        let minute = ((rem % 3600) / 60) as u16;
        let second = (rem % 60) as u16;

        Self {
            date: (year << 9) | ((month as u16) << 5) | day as u16,
            time: (hour << 11) | (minute << 5) | (second / 2),
        }
    }

    /// Converts the DOS representation back to epoch seconds (UTC).
    ///
    /// Out-of-range fields found in damaged archives are clamped instead of
    /// rejected.
    pub fn to_epoch(self) -> u32 {
        let year = 1980 + (self.date >> 9) as i64;
        let month = ((self.date >> 5) & 0x0F).clamp(1, 12) as u32;
        let day = (self.date & 0x1F).max(1) as u32;
        let hour = ((self.time >> 11) & 0x1F).min(23) as i64;
        let minute = ((self.time >> 5) & 0x3F).min(59) as i64;
        let second = ((self.time & 0x1F) * 2).min(59) as i64;

        let days = days_from_civil(year, month, day);
        let secs = days * SECONDS_PER_DAY + hour * 3600 + minute * 60 + second;
        secs.clamp(0, u32::MAX as i64) as u32
    }
}

/// Truncates a wide epoch-seconds value to the 32-bit field width.
pub fn truncate_epoch(secs: i64) -> u32 {
    secs as u32
}

/// Returns the current time as 32-bit epoch seconds.
pub fn now() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    truncate_epoch(secs as i64)
}

/// Converts a [`SystemTime`] into 32-bit epoch seconds, if representable.
pub fn from_system_time(time: SystemTime) -> Option<u32> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| truncate_epoch(d.as_secs() as i64))
}

// Proleptic Gregorian calendar conversions (Howard Hinnant's algorithms).
/// Formats epoch seconds as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_utc(secs: u32) -> String {
    let secs = secs as i64;
    let (year, month, day) = civil_from_days(secs.div_euclid(SECONDS_PER_DAY));
    let rem = secs.rem_euclid(SECONDS_PER_DAY);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year,
        month,
        day,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = month as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_epoch_is_1980() {
        let dos = DosDateTime::from_epoch(DOS_EPOCH);
        assert_eq!(dos.date, (1 << 5) | 1);
        assert_eq!(dos.time, 0);
        assert_eq!(dos.to_epoch(), DOS_EPOCH);
    }

    #[test]
    fn test_known_date() {
        // 2023-11-14T22:13:20Z
        let dos = DosDateTime::from_epoch(1_700_000_000);
        assert_eq!(dos.date >> 9, 2023 - 1980);
        assert_eq!((dos.date >> 5) & 0x0F, 11);
        assert_eq!(dos.date & 0x1F, 14);
        assert_eq!(dos.time >> 11, 22);
        assert_eq!((dos.time >> 5) & 0x3F, 13);
        assert_eq!((dos.time & 0x1F) * 2, 20);
    }

    #[test]
    fn test_odd_seconds_round_down() {
        let dos = DosDateTime::from_epoch(1_700_000_001);
        assert_eq!(dos.to_epoch(), 1_700_000_000);
    }

    #[test]
    fn test_pre_1980_clamps() {
        assert_eq!(DosDateTime::from_epoch(0).to_epoch(), DOS_EPOCH);
    }

    #[test]
    fn test_leap_day() {
        // 2024-02-29T12:00:00Z
        let secs = 1_709_208_000;
        let dos = DosDateTime::from_epoch(secs);
        assert_eq!((dos.date >> 5) & 0x0F, 2);
        assert_eq!(dos.date & 0x1F, 29);
        assert_eq!(dos.to_epoch(), secs);
    }

    #[test]
    fn test_damaged_fields_clamp() {
        // month 0, day 0
        let dos = DosDateTime::new(10 << 9, 0);
        assert_eq!(dos.to_epoch(), DosDateTime::new((10 << 9) | (1 << 5) | 1, 0).to_epoch());
    }

    #[test]
    fn test_truncate_epoch_wraps() {
        assert_eq!(truncate_epoch(1 << 32), 0);
        assert_eq!(truncate_epoch((1 << 32) + 5), 5);
    }

    #[test]
    fn test_format_utc() {
        assert_eq!(format_utc(0), "1970-01-01 00:00:00");
        assert_eq!(format_utc(DOS_EPOCH + 61), "1980-01-01 00:01:01");
    }
}
