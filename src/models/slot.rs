//! Materialized bookable slot instances.
//!
//! Slots are generated from a recurring rule but stored independently:
//! the rule is a template, not a foreign-key parent. Editing or deleting
//! a rule never corrupts already-materialized slots unless regeneration
//! is explicitly invoked.

use serde::{Deserialize, Serialize};

use super::time::{DayOfWeek, TimeRange};
use crate::api::{ServiceId, SlotId, VendorId};

/// Status applied through the vendor-facing bulk operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Active,
    Inactive,
    Deleted,
}

/// A bookable time interval for one weekday recurrence.
///
/// Capacity consumption is tracked per `(slot, date)` in the reservation
/// ledger; `reservation_count` holds the ledger value for the date a
/// query was made against (0 when listed without a date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotInstance {
    /// Database id, None before first insert
    pub id: Option<SlotId>,
    pub vendor_id: VendorId,
    pub service_id: Option<ServiceId>,
    pub day_of_week: DayOfWeek,
    pub start_time: chrono::NaiveTime,
    pub end_time: chrono::NaiveTime,
    pub is_available: bool,
    /// Maximum concurrent bookings this slot accepts
    pub max_bookings: i32,
    /// Reservations held for the queried date
    pub reservation_count: i32,
}

impl SlotInstance {
    /// Slot interval as a half-open range.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    /// Whether another reservation fits for the queried date.
    pub fn has_capacity(&self) -> bool {
        self.is_available && self.reservation_count < self.max_bookings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn slot(count: i32, max: i32) -> SlotInstance {
        SlotInstance {
            id: Some(SlotId(1)),
            vendor_id: VendorId(1),
            service_id: None,
            day_of_week: DayOfWeek::Mon,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            is_available: true,
            max_bookings: max,
            reservation_count: count,
        }
    }

    #[test]
    fn capacity_check() {
        assert!(slot(0, 1).has_capacity());
        assert!(!slot(1, 1).has_capacity());
        assert!(slot(2, 3).has_capacity());
    }

    #[test]
    fn unavailable_slot_has_no_capacity() {
        let mut s = slot(0, 1);
        s.is_available = false;
        assert!(!s.has_capacity());
    }

    #[test]
    fn status_serde() {
        assert_eq!(
            serde_json::to_string(&SlotStatus::Inactive).unwrap(),
            "\"inactive\""
        );
    }
}
