//! Recurring weekly availability rules.
//!
//! A rule is a vendor's template schedule for one weekday: working hours,
//! break intervals, slot duration/buffer defaults and an effective date
//! window. Rules are templates only; materialized slots are stored
//! independently (see [`crate::models::slot`]).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::time::{DayOfWeek, TimeRange};
use crate::api::{RuleId, VendorId};

/// Allowed slot duration range, in minutes.
pub const MIN_SLOT_DURATION: i32 = 15;
pub const MAX_SLOT_DURATION: i32 = 480;

/// Allowed buffer range, in minutes.
pub const MIN_BUFFER: i32 = 0;
pub const MAX_BUFFER: i32 = 120;

/// How a new schedule applies over time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ApplyMode {
    /// Open-ended rule; supersedes any prior ongoing rule for the same day.
    Ongoing,
    /// Rule scoped to `[start, end]`; ongoing rules are left untouched.
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A vendor's recurring availability rule for one weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringAvailability {
    /// Database id, None before first insert
    pub id: Option<RuleId>,
    pub vendor_id: VendorId,
    pub day_of_week: DayOfWeek,
    /// Working hours for the day
    pub start_time: chrono::NaiveTime,
    pub end_time: chrono::NaiveTime,
    /// Break intervals inside working hours
    #[serde(default)]
    pub break_times: Vec<TimeRange>,
    /// Default slot duration in minutes
    pub default_duration: i32,
    /// Idle minutes enforced between consecutive slots
    pub buffer_time: i32,
    /// First date the rule applies (None = immediately)
    pub effective_from: Option<NaiveDate>,
    /// Last date the rule applies (None = ongoing)
    pub effective_until: Option<NaiveDate>,
    /// Per-slot booking capacity carried into generated slots
    #[serde(default = "default_concurrency")]
    pub max_concurrent: i32,
    pub is_active: bool,
}

fn default_concurrency() -> i32 {
    1
}

impl RecurringAvailability {
    /// Working hours as a half-open interval.
    pub fn working_hours(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    /// An ongoing rule has no end date.
    pub fn is_ongoing(&self) -> bool {
        self.effective_until.is_none()
    }

    /// Whether the rule governs the given calendar date.
    ///
    /// Matches the weekday and the effective window; the active flag is
    /// checked by the caller so superseded rules stay queryable.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        if DayOfWeek::of_date(date) != self.day_of_week {
            return false;
        }
        if let Some(from) = self.effective_from {
            if date < from {
                return false;
            }
        }
        if let Some(until) = self.effective_until {
            if date > until {
                return false;
            }
        }
        true
    }

    /// Width of the effective window in days, None when open-ended.
    ///
    /// Used as the specificity measure when tie-breaking between rules
    /// that should never both be active.
    pub fn window_span_days(&self) -> Option<i64> {
        match (self.effective_from, self.effective_until) {
            (Some(from), Some(until)) => Some((until - from).num_days()),
            _ => None,
        }
    }

    /// Validate all scheduling fields, collecting every failure.
    ///
    /// Runs before any mutation; a non-empty result aborts the whole
    /// operation.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if !self.working_hours().is_valid() {
            errors.push(FieldError::new(
                "end_time",
                format!(
                    "end time {} must be after start time {}",
                    self.end_time, self.start_time
                ),
            ));
        }

        let hours = self.working_hours();
        for brk in &self.break_times {
            if !brk.is_valid() {
                errors.push(FieldError::new(
                    "break_times",
                    format!("break end {} must be after start {}", brk.end, brk.start),
                ));
            } else if !hours.contains(brk) {
                errors.push(FieldError::new(
                    "break_times",
                    format!(
                        "break {}-{} falls outside working hours {}-{}",
                        brk.start, brk.end, self.start_time, self.end_time
                    ),
                ));
            }
        }

        if !(MIN_SLOT_DURATION..=MAX_SLOT_DURATION).contains(&self.default_duration) {
            errors.push(FieldError::new(
                "default_duration",
                format!(
                    "duration {} outside [{}, {}] minutes",
                    self.default_duration, MIN_SLOT_DURATION, MAX_SLOT_DURATION
                ),
            ));
        }

        if !(MIN_BUFFER..=MAX_BUFFER).contains(&self.buffer_time) {
            errors.push(FieldError::new(
                "buffer_time",
                format!(
                    "buffer {} outside [{}, {}] minutes",
                    self.buffer_time, MIN_BUFFER, MAX_BUFFER
                ),
            ));
        }

        if let (Some(from), Some(until)) = (self.effective_from, self.effective_until) {
            if until <= from {
                errors.push(FieldError::new(
                    "effective_until",
                    format!("range end {} must be after start {}", until, from),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Merge overlapping or touching break intervals into a sorted,
/// non-overlapping list.
///
/// Normalization runs before the generator's rejection logic so the
/// accept/skip decision never depends on the order breaks were supplied.
pub fn normalize_breaks(breaks: &[TimeRange]) -> Vec<TimeRange> {
    let mut sorted: Vec<TimeRange> = breaks.iter().filter(|b| b.is_valid()).copied().collect();
    sorted.sort_by_key(|b| (b.start, b.end));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for brk in sorted {
        match merged.last_mut() {
            Some(last) if brk.start <= last.end => {
                if brk.end > last.end {
                    last.end = brk.end;
                }
            }
            _ => merged.push(brk),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rule() -> RecurringAvailability {
        RecurringAvailability {
            id: None,
            vendor_id: VendorId(1),
            day_of_week: DayOfWeek::Mon,
            start_time: t(9, 0),
            end_time: t(17, 0),
            break_times: vec![TimeRange::new(t(12, 0), t(13, 0))],
            default_duration: 60,
            buffer_time: 15,
            effective_from: None,
            effective_until: None,
            max_concurrent: 1,
            is_active: true,
        }
    }

    #[test]
    fn valid_rule_passes() {
        assert!(rule().validate().is_ok());
    }

    #[test]
    fn end_before_start_rejected() {
        let mut r = rule();
        r.end_time = t(8, 0);
        let errors = r.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "end_time"));
    }

    #[test]
    fn break_outside_hours_rejected() {
        let mut r = rule();
        r.break_times = vec![TimeRange::new(t(8, 0), t(8, 30))];
        let errors = r.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "break_times"));
    }

    #[test]
    fn duration_and_buffer_bounds() {
        let mut r = rule();
        r.default_duration = 10;
        r.buffer_time = 121;
        let errors = r.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn inverted_date_range_rejected() {
        let mut r = rule();
        r.effective_from = Some(d(2026, 9, 7));
        r.effective_until = Some(d(2026, 9, 7));
        assert!(r.validate().is_err());
    }

    #[test]
    fn applies_on_checks_weekday_and_window() {
        let mut r = rule();
        r.effective_from = Some(d(2026, 9, 1));
        r.effective_until = Some(d(2026, 9, 30));

        // 2026-09-07 and 2026-10-05 are Mondays
        assert!(r.applies_on(d(2026, 9, 7)));
        assert!(!r.applies_on(d(2026, 9, 8)));
        assert!(!r.applies_on(d(2026, 10, 5)));
    }

    #[test]
    fn window_span_for_tie_break() {
        let mut narrow = rule();
        narrow.effective_from = Some(d(2026, 9, 1));
        narrow.effective_until = Some(d(2026, 9, 14));
        assert_eq!(narrow.window_span_days(), Some(13));
        assert_eq!(rule().window_span_days(), None);
    }

    #[test]
    fn breaks_merge_regardless_of_order() {
        let a = vec![
            TimeRange::new(t(12, 30), t(13, 30)),
            TimeRange::new(t(12, 0), t(13, 0)),
        ];
        let b = vec![
            TimeRange::new(t(12, 0), t(13, 0)),
            TimeRange::new(t(12, 30), t(13, 30)),
        ];
        let merged = normalize_breaks(&a);
        assert_eq!(merged, normalize_breaks(&b));
        assert_eq!(merged, vec![TimeRange::new(t(12, 0), t(13, 30))]);
    }

    #[test]
    fn touching_breaks_merge() {
        let merged = normalize_breaks(&[
            TimeRange::new(t(12, 0), t(12, 30)),
            TimeRange::new(t(12, 30), t(13, 0)),
        ]);
        assert_eq!(merged, vec![TimeRange::new(t(12, 0), t(13, 0))]);
    }
}
