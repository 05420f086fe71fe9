//! Pure slot generation from a recurring availability rule.
//!
//! Generation is deterministic and side-effect-free: the same rule and
//! date always produce the same slot list, so callers can regenerate at
//! will and diff against stored state.

use chrono::{Duration, NaiveDate};

use crate::models::{normalize_breaks, RecurringAvailability, SlotInstance, TimeRange};

/// Materialize the bookable slots a rule defines for one calendar date.
///
/// Candidates start at `start_time` and advance by
/// `default_duration + buffer_time`. A candidate is dropped when it
/// intersects a break; generation stops once the candidate would end
/// after `end_time`. Days the rule does not govern (wrong weekday,
/// outside the effective window, inactive) yield an empty vec.
pub fn generate(rule: &RecurringAvailability, date: NaiveDate) -> Vec<SlotInstance> {
    if !rule.is_active || !rule.applies_on(date) {
        return Vec::new();
    }

    let breaks = normalize_breaks(&rule.break_times);
    let duration = Duration::minutes(i64::from(rule.default_duration));
    let step = duration + Duration::minutes(i64::from(rule.buffer_time));

    let mut slots = Vec::new();
    let mut start = rule.start_time;
    loop {
        // NaiveTime arithmetic wraps at midnight; a wrap means the
        // candidate ran off the end of the day.
        let (end, wrapped) = start.overflowing_add_signed(duration);
        if wrapped != 0 || end > rule.end_time {
            break;
        }

        let candidate = TimeRange::new(start, end);
        if !breaks.iter().any(|b| b.overlaps(&candidate)) {
            slots.push(SlotInstance {
                id: None,
                vendor_id: rule.vendor_id,
                service_id: None,
                day_of_week: rule.day_of_week,
                start_time: start,
                end_time: end,
                is_available: true,
                max_bookings: rule.max_concurrent.max(1),
                reservation_count: 0,
            });
        }

        let (next, wrapped) = start.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        start = next;
    }

    slots
}
