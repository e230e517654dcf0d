//! Wall-clock derived persona fields: time of day, season, weekend.
//!
//! All derivations are pure functions of a local date/time.

use std::fmt;

use chrono::{Local, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// `[5,12)` morning, `[12,18)` afternoon, `[18,22)` evening, else night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Meteorological seasons, northern hemisphere.  `month` is 1-based.
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Self::Winter,
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            _ => Self::Autumn,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Parse the configured zone.  `local` (or empty) means the host zone and
/// yields `None`; an unknown name is logged and also falls back to local.
pub fn resolve_timezone(name: &str) -> Option<Tz> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
        return None;
    }
    match trimmed.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(_) => {
            warn!(timezone = trimmed, "unknown timezone, using host local time");
            None
        }
    }
}

/// Current wall-clock time in `tz`, or in the host zone when `None`.
pub fn wall_clock(tz: Option<Tz>) -> NaiveDateTime {
    match tz {
        Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
        None => Local::now().naive_local(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_boundaries() {
        let cases = [
            (4, TimeOfDay::Night),
            (5, TimeOfDay::Morning),
            (11, TimeOfDay::Morning),
            (12, TimeOfDay::Afternoon),
            (14, TimeOfDay::Afternoon),
            (17, TimeOfDay::Afternoon),
            (18, TimeOfDay::Evening),
            (21, TimeOfDay::Evening),
            (22, TimeOfDay::Night),
            (0, TimeOfDay::Night),
            (23, TimeOfDay::Night),
        ];
        for (hour, expected) in cases {
            assert_eq!(TimeOfDay::from_hour(hour), expected, "hour {hour}");
        }
    }

    #[test]
    fn month_boundaries() {
        let cases = [
            (1, Season::Winter),
            (2, Season::Winter),
            (3, Season::Spring),
            (5, Season::Spring),
            (6, Season::Summer),
            (8, Season::Summer),
            (9, Season::Autumn),
            (11, Season::Autumn),
            (12, Season::Winter),
        ];
        for (month, expected) in cases {
            assert_eq!(Season::from_month(month), expected, "month {month}");
        }
    }

    #[test]
    fn weekend_days() {
        assert!(is_weekend(Weekday::Sat));
        assert!(is_weekend(Weekday::Sun));
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            assert!(!is_weekend(day), "{day:?}");
        }
    }

    #[test]
    fn timezone_resolution() {
        assert!(resolve_timezone("local").is_none());
        assert!(resolve_timezone("").is_none());
        assert!(resolve_timezone("Not/AZone").is_none());
        assert_eq!(resolve_timezone("Asia/Tokyo"), Some(chrono_tz::Asia::Tokyo));
    }

    #[test]
    fn labels_are_lowercase() {
        assert_eq!(TimeOfDay::Evening.to_string(), "evening");
        assert_eq!(Season::Autumn.to_string(), "autumn");
        assert_eq!(serde_json::to_string(&Season::Spring).unwrap(), "\"spring\"");
    }
}
