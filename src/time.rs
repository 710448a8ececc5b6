//! MS-DOS date/time fields as stored in ZIP headers.
//!
//! ZIP timestamps carry no time zone, so they map to [`NaiveDateTime`]
//! wall-clock values. Resolution is two seconds and the range is
//! 1980-01-01 00:00:00 through 2107-12-31 23:59:58; values outside the range
//! are clamped to its ends.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

const DOS_EPOCH_YEAR: i32 = 1980;
const DOS_MAX_YEAR: i32 = DOS_EPOCH_YEAR + 0x7F;

/// Packed DOS `time` and `date` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00
    pub const EPOCH: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// 2107-12-31 23:59:58
    pub const MAX: DosDateTime = DosDateTime {
        time: (23 << 11) | (59 << 5) | 29,
        date: (0x7F << 9) | (12 << 5) | 31,
    };

    pub fn from_datetime(value: &NaiveDateTime) -> Self {
        if value.year() < DOS_EPOCH_YEAR {
            return Self::EPOCH;
        }
        if value.year() > DOS_MAX_YEAR {
            return Self::MAX;
        }

        let time = (value.second() / 2) as u16
            | (value.minute() as u16) << 5
            | (value.hour() as u16) << 11;
        let date = value.day() as u16
            | (value.month() as u16) << 5
            | ((value.year() - DOS_EPOCH_YEAR) as u16) << 9;

        Self { time, date }
    }

    /// Unpacks the fields, or `None` when they name an impossible date or time
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        let year = DOS_EPOCH_YEAR + ((self.date >> 9) & 0x7F) as i32;
        let month = ((self.date >> 5) & 0x0F) as u32;
        let day = (self.date & 0x1F) as u32;
        let hour = ((self.time >> 11) & 0x1F) as u32;
        let minute = ((self.time >> 5) & 0x3F) as u32;
        let second = ((self.time & 0x1F) * 2) as u32;

        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }
}

/// Packs a timestamp into `(time, date)` header fields
pub fn to_dos_time(value: &NaiveDateTime) -> (u16, u16) {
    let dos = DosDateTime::from_datetime(value);
    (dos.time, dos.date)
}

/// Unpacks header fields, falling back to the DOS epoch for invalid values
pub fn from_dos_time(time: u16, date: u16) -> NaiveDateTime {
    let dos = DosDateTime { time, date };
    dos.to_datetime()
        .or_else(|| DosDateTime::EPOCH.to_datetime())
        .unwrap_or_default()
}
