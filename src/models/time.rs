use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Day of the week a recurring rule applies to.
///
/// Serialized with the short symbolic names used by the persisted shape
/// ("mon".."sun"). Slot instances store the numeric index (Monday = 0).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    /// Numeric index, Monday = 0 .. Sunday = 6.
    pub fn index(&self) -> i32 {
        *self as i32
    }

    /// Inverse of [`DayOfWeek::index`].
    pub fn from_index(index: i32) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    /// Weekday of a calendar date.
    pub fn of_date(date: NaiveDate) -> Self {
        // chrono uses the same Monday-first ordering
        Self::ALL[date.weekday().num_days_from_monday() as usize]
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DayOfWeek::Mon => "mon",
            DayOfWeek::Tue => "tue",
            DayOfWeek::Wed => "wed",
            DayOfWeek::Thu => "thu",
            DayOfWeek::Fri => "fri",
            DayOfWeek::Sat => "sat",
            DayOfWeek::Sun => "sun",
        };
        write!(f, "{}", name)
    }
}

/// Half-open time interval `[start, end)` within a single day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether the interval is well-formed (end strictly after start).
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Whether two half-open intervals share any instant.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely within this interval.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_index_roundtrip() {
        for day in DayOfWeek::ALL {
            assert_eq!(DayOfWeek::from_index(day.index()), Some(day));
        }
        assert_eq!(DayOfWeek::from_index(7), None);
        assert_eq!(DayOfWeek::from_index(-1), None);
    }

    #[test]
    fn day_of_date() {
        // 2026-08-31 is a Monday
        let date = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        assert_eq!(DayOfWeek::of_date(date), DayOfWeek::Mon);
        assert_eq!(DayOfWeek::of_date(date.succ_opt().unwrap()), DayOfWeek::Tue);
    }

    #[test]
    fn day_serde_short_names() {
        assert_eq!(serde_json::to_string(&DayOfWeek::Wed).unwrap(), "\"wed\"");
        let day: DayOfWeek = serde_json::from_str("\"sun\"").unwrap();
        assert_eq!(day, DayOfWeek::Sun);
    }

    #[test]
    fn range_overlap_is_half_open() {
        let morning = TimeRange::new(t(9, 0), t(12, 0));
        let noon = TimeRange::new(t(12, 0), t(13, 0));
        assert!(!morning.overlaps(&noon));
        assert!(morning.overlaps(&TimeRange::new(t(11, 59), t(12, 30))));
    }

    #[test]
    fn range_containment() {
        let hours = TimeRange::new(t(9, 0), t(17, 0));
        assert!(hours.contains(&TimeRange::new(t(12, 0), t(13, 0))));
        assert!(!hours.contains(&TimeRange::new(t(16, 30), t(17, 30))));
    }
}
