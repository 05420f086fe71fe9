use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{bookings, recurring_availabilities, slot_instances, slot_reservations};
use crate::api::{BookingId, RuleId, ServiceId, SlotId, VendorId};
use crate::db::repository::error::{RepositoryError, RepositoryResult};
use crate::models::{
    Booking, BookingStatus, DayOfWeek, RecurringAvailability, SlotInstance, TimeRange,
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = recurring_availabilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // Some fields used only for database operations
pub struct RuleRow {
    pub rule_id: i64,
    pub vendor_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_times_json: Value,
    pub default_duration: i32,
    pub buffer_time: i32,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub max_concurrent: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = recurring_availabilities)]
#[diesel(treat_none_as_null = true)]
pub struct NewRuleRow {
    pub vendor_id: i64,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_times_json: Value,
    pub default_duration: i32,
    pub buffer_time: i32,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub max_concurrent: i32,
    pub is_active: bool,
}

impl NewRuleRow {
    pub fn from_domain(rule: &RecurringAvailability) -> RepositoryResult<Self> {
        Ok(Self {
            vendor_id: rule.vendor_id.value(),
            day_of_week: rule.day_of_week.index() as i16,
            start_time: rule.start_time,
            end_time: rule.end_time,
            break_times_json: serde_json::to_value(&rule.break_times).map_err(|e| {
                RepositoryError::query(format!("failed to serialize break times: {}", e))
            })?,
            default_duration: rule.default_duration,
            buffer_time: rule.buffer_time,
            effective_from: rule.effective_from,
            effective_until: rule.effective_until,
            max_concurrent: rule.max_concurrent,
            is_active: rule.is_active,
        })
    }
}

impl TryFrom<RuleRow> for RecurringAvailability {
    type Error = RepositoryError;

    fn try_from(row: RuleRow) -> RepositoryResult<Self> {
        let break_times: Vec<TimeRange> =
            serde_json::from_value(row.break_times_json).map_err(|e| {
                RepositoryError::query(format!("corrupt break times for rule {}: {}", row.rule_id, e))
            })?;
        let day_of_week = DayOfWeek::from_index(i32::from(row.day_of_week)).ok_or_else(|| {
            RepositoryError::query(format!(
                "corrupt day of week {} for rule {}",
                row.day_of_week, row.rule_id
            ))
        })?;
        Ok(RecurringAvailability {
            id: Some(RuleId(row.rule_id)),
            vendor_id: VendorId(row.vendor_id),
            day_of_week,
            start_time: row.start_time,
            end_time: row.end_time,
            break_times,
            default_duration: row.default_duration,
            buffer_time: row.buffer_time,
            effective_from: row.effective_from,
            effective_until: row.effective_until,
            max_concurrent: row.max_concurrent,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = slot_instances)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // Some fields used only for database operations
pub struct SlotRow {
    pub slot_id: i64,
    pub vendor_id: i64,
    pub service_id: Option<i64>,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub max_bookings: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = slot_instances)]
pub struct NewSlotRow {
    pub vendor_id: i64,
    pub service_id: Option<i64>,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub max_bookings: i32,
}

impl NewSlotRow {
    pub fn from_domain(slot: &SlotInstance) -> Self {
        Self {
            vendor_id: slot.vendor_id.value(),
            service_id: slot.service_id.map(|s| s.value()),
            day_of_week: slot.day_of_week.index() as i16,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_available: slot.is_available,
            max_bookings: slot.max_bookings,
        }
    }
}

impl SlotRow {
    /// Build the domain slot, attaching the ledger count for the queried
    /// date (0 when no date was supplied).
    pub fn into_domain(self, reservation_count: i32) -> RepositoryResult<SlotInstance> {
        let day_of_week = DayOfWeek::from_index(i32::from(self.day_of_week)).ok_or_else(|| {
            RepositoryError::query(format!(
                "corrupt day of week {} for slot {}",
                self.day_of_week, self.slot_id
            ))
        })?;
        Ok(SlotInstance {
            id: Some(SlotId(self.slot_id)),
            vendor_id: VendorId(self.vendor_id),
            service_id: self.service_id.map(ServiceId),
            day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            is_available: self.is_available,
            max_bookings: self.max_bookings,
            reservation_count,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = slot_reservations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReservationRow {
    pub slot_id: i64,
    pub reserved_date: NaiveDate,
    pub reserved_count: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // Some fields used only for database operations
pub struct BookingRow {
    pub booking_id: i64,
    pub vendor_id: i64,
    pub slot_id: i64,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = bookings)]
pub struct NewBookingRow {
    pub vendor_id: i64,
    pub slot_id: i64,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: String,
}

impl NewBookingRow {
    pub fn from_domain(booking: &Booking) -> Self {
        Self {
            vendor_id: booking.vendor_id.value(),
            slot_id: booking.slot_id.value(),
            scheduled_date: booking.scheduled_date,
            start_time: booking.start_time,
            duration_minutes: booking.duration_minutes,
            status: booking.status.to_string(),
        }
    }
}

pub fn parse_status(raw: &str) -> RepositoryResult<BookingStatus> {
    match raw {
        "pending" => Ok(BookingStatus::Pending),
        "confirmed" => Ok(BookingStatus::Confirmed),
        "in_progress" => Ok(BookingStatus::InProgress),
        "completed" => Ok(BookingStatus::Completed),
        "cancelled" => Ok(BookingStatus::Cancelled),
        other => Err(RepositoryError::query(format!(
            "corrupt booking status '{}'",
            other
        ))),
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> RepositoryResult<Self> {
        let status = parse_status(&row.status)?;
        Ok(Booking {
            id: Some(BookingId(row.booking_id)),
            vendor_id: VendorId(row.vendor_id),
            slot_id: SlotId(row.slot_id),
            scheduled_date: row.scheduled_date,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes,
            status,
        })
    }
}
