/// Filename rules for captured earth images
///
/// Merged captures are named `earth_YYYYMMDD_HHMM_black.png` with the
/// date and time in UTC. Every field is zero-padded, so plain string
/// order of the names is also capture order.

use chrono::{DateTime, Local, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::state::ImageEntry;

/// Names eligible for display. ASCII digits only.
static IMAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^earth_[0-9]{8}_[0-9]{4}_black\.png$").unwrap());

/// Date and time groups of an eligible name
static CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"earth_([0-9]{8})_([0-9]{4})").unwrap());

/// Display format for the local capture time
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shown when the digits do not form a real calendar instant
pub const INVALID_DATE: &str = "Invalid Date";

pub fn is_image_name(name: &str) -> bool {
    IMAGE_NAME.is_match(name)
}

/// Pick the newest image among `entries`.
///
/// Directories and non-matching names are skipped. Among the rest the
/// string-maximal name wins; dates are never parsed here.
pub fn select_latest(entries: &[ImageEntry]) -> Option<&str> {
    entries
        .iter()
        .filter(|e| e.is_file && is_image_name(&e.name))
        .map(|e| e.name.as_str())
        .max()
}

/// UTC capture time encoded in an image name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTime {
    Valid(DateTime<Utc>),
    /// Pattern matched but e.g. month 13 or hour 25
    Invalid,
}

impl CaptureTime {
    /// Extract the capture time from `name`.
    ///
    /// Returns `None` only if the date/time groups are missing entirely.
    pub fn from_name(name: &str) -> Option<Self> {
        let caps = CAPTURE.captures(name)?;
        let date = caps.get(1)?.as_str();
        let time = caps.get(2)?.as_str();
        Some(Self::from_digits(date, time))
    }

    fn from_digits(date: &str, time: &str) -> Self {
        let field = |s: &str| s.parse::<u32>().ok();
        let parsed = (|| {
            let year = date[0..4].parse::<i32>().ok()?;
            let month = field(&date[4..6])?;
            let day = field(&date[6..8])?;
            let hour = field(&time[0..2])?;
            let minute = field(&time[2..4])?;
            Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single()
        })();

        match parsed {
            Some(instant) => CaptureTime::Valid(instant),
            None => CaptureTime::Invalid,
        }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            CaptureTime::Valid(instant) => Some(*instant),
            CaptureTime::Invalid => None,
        }
    }

    /// Format in the host time zone
    pub fn to_local_string(&self) -> String {
        self.format_in(&Local)
    }

    pub fn format_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match self.instant() {
            Some(instant) => instant.with_timezone(tz).format(LOCAL_TIME_FORMAT).to_string(),
            None => INVALID_DATE.to_string(),
        }
    }
}
