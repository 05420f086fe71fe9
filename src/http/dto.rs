//! Request and response payloads for the HTTP API.
//!
//! Service-layer types that already serialize cleanly are re-exported
//! rather than duplicated.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::api::{RuleId, SlotId};
use crate::models::{BookingStatus, DayOfWeek, RecurringAvailability, SlotInstance, SlotStatus};

pub use crate::api::{GenerationWarning, ScheduleOutcome};
pub use crate::services::availability::{DaySchedule, RulePatch, RuleStatusAction, ScheduleRequest};
pub use crate::services::reservation::ReservationOutcome;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Batch activate/deactivate/delete request for availability rules.
#[derive(Debug, Deserialize)]
pub struct RuleStatusRequest {
    pub rule_ids: Vec<RuleId>,
    pub action: RuleStatusAction,
}

/// Number of records affected by a batch status change.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchStatusResponse {
    pub affected: usize,
}

/// Resolved availability for a single calendar date.
#[derive(Debug, Serialize)]
pub struct AvailabilityDayResponse {
    pub rule: RecurringAvailability,
    pub slots: Vec<SlotInstance>,
}

/// Query parameters for slot listing.
#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<NaiveDate>,
    pub day_of_week: Option<DayOfWeek>,
}

#[derive(Debug, Serialize)]
pub struct SlotListResponse {
    pub slots: Vec<SlotInstance>,
    pub total: usize,
}

/// Batch slot status change request.
#[derive(Debug, Deserialize)]
pub struct SlotStatusRequest {
    pub slot_ids: Vec<SlotId>,
    pub status: SlotStatus,
    #[serde(default)]
    pub force: bool,
}

/// Booking creation request.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub vendor_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: Option<i32>,
}

/// Booking reschedule request.
#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

/// Booking lifecycle transition request.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: BookingStatus,
}
