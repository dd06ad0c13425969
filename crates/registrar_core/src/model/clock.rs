//! Wall-clock time of day used by classroom schedules.
//!
//! # Invariants
//! - Stored with millisecond precision so fractional seconds survive
//!   parse/format cycles.
//! - Always within `00:00:00.000..=23:59:59.999`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static WALL_CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,3}))?)?$").expect("valid wall clock regex")
});

const MILLIS_PER_SECOND: u32 = 1_000;
const MILLIS_PER_MINUTE: u32 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u32 = 60 * MILLIS_PER_MINUTE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallClockParseError(pub String);

impl Display for WallClockParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid time of day `{}`; expected HH:MM[:SS[.fff]]", self.0)
    }
}

impl Error for WallClockParseError {}

/// Time of day without date or zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallClock {
    millis_of_day: u32,
}

impl WallClock {
    /// Builds a clock from whole components. Returns `None` when out of range.
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        Self::from_hms_milli(hour, minute, second, 0)
    }

    pub fn from_hms_milli(hour: u32, minute: u32, second: u32, milli: u32) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 || milli > 999 {
            return None;
        }
        Some(Self {
            millis_of_day: hour * MILLIS_PER_HOUR
                + minute * MILLIS_PER_MINUTE
                + second * MILLIS_PER_SECOND
                + milli,
        })
    }

    pub fn hour(self) -> u32 {
        self.millis_of_day / MILLIS_PER_HOUR
    }

    pub fn minute(self) -> u32 {
        (self.millis_of_day % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE
    }

    pub fn second(self) -> u32 {
        (self.millis_of_day % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND
    }

    pub fn millisecond(self) -> u32 {
        self.millis_of_day % MILLIS_PER_SECOND
    }

    /// `h*60 + m + s/60`, keeping fractional seconds.
    pub fn minutes_since_midnight(self) -> f64 {
        f64::from(self.millis_of_day) / f64::from(MILLIS_PER_MINUTE)
    }
}

impl FromStr for WallClock {
    type Err = WallClockParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let err = || WallClockParseError(trimmed.to_string());
        let caps = WALL_CLOCK_RE.captures(trimmed).ok_or_else(err)?;

        let number = |index: usize| -> u32 {
            caps.get(index)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0)
        };
        // ".5" means 500 ms, not 5 ms.
        let milli = caps
            .get(4)
            .map(|m| {
                let digits = m.as_str();
                let scale = 10u32.pow(3 - digits.len() as u32);
                digits.parse::<u32>().unwrap_or(0) * scale
            })
            .unwrap_or(0);

        Self::from_hms_milli(number(1), number(2), number(3), milli).ok_or_else(err)
    }
}

impl TryFrom<String> for WallClock {
    type Error = WallClockParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallClock> for String {
    fn from(value: WallClock) -> Self {
        value.to_string()
    }
}

impl Display for WallClock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour(),
            self.minute(),
            self.second()
        )?;
        if self.millisecond() > 0 {
            write!(f, ".{:03}", self.millisecond())?;
        }
        Ok(())
    }
}
