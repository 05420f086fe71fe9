//! HTTP request handlers.
//!
//! Handlers stay thin: decode the request, call the service layer,
//! encode the result. All domain rules live in `crate::services`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;

use crate::api::{BookingId, RuleId, ScheduleOutcome, VendorId};
use crate::db::repository::SlotFilter;
use crate::models::Booking;
use crate::services;

use super::dto::{
    AvailabilityDayResponse, BatchStatusResponse, CreateBookingRequest, HealthResponse,
    RescheduleRequest, ReservationOutcome, RulePatch, RuleStatusRequest, ScheduleRequest,
    SlotListResponse, SlotStatusRequest, SlotsQuery, TransitionRequest,
};
use super::error::AppError;
use super::state::AppState;

/// Result type for handlers returning JSON.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "unavailable".to_string(),
        Err(e) => format!("unavailable: {}", e),
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    })
}

/// Apply a vendor's weekly schedule and materialize its slots.
pub async fn set_schedule(
    State(state): State<AppState>,
    Path(vendor_id): Path<i64>,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleOutcome>), AppError> {
    let outcome =
        services::availability::set_schedule(&*state.repository, VendorId::new(vendor_id), request)
            .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Patch a single availability rule.
pub async fn update_rule(
    State(state): State<AppState>,
    Path((vendor_id, rule_id)): Path<(i64, i64)>,
    Json(patch): Json<RulePatch>,
) -> HandlerResult<ScheduleOutcome> {
    let outcome = services::availability::update_rule(
        &*state.repository,
        VendorId::new(vendor_id),
        RuleId::new(rule_id),
        patch,
    )
    .await?;
    Ok(Json(outcome))
}

/// Activate, deactivate or delete a batch of rules.
pub async fn set_rule_status(
    State(state): State<AppState>,
    Path(vendor_id): Path<i64>,
    Json(request): Json<RuleStatusRequest>,
) -> HandlerResult<BatchStatusResponse> {
    let affected = services::availability::set_rules_status(
        &*state.repository,
        VendorId::new(vendor_id),
        &request.rule_ids,
        request.action,
    )
    .await?;
    Ok(Json(BatchStatusResponse { affected }))
}

/// Resolve the rule governing a date and the slots open on it.
pub async fn get_day_availability(
    State(state): State<AppState>,
    Path((vendor_id, date)): Path<(i64, NaiveDate)>,
) -> HandlerResult<AvailabilityDayResponse> {
    let vendor = VendorId::new(vendor_id);
    let rule = services::availability::resolve_for_date(&*state.repository, vendor, date).await?;
    let slots = services::slots::list_active_slots(
        &*state.repository,
        vendor,
        SlotFilter {
            date: Some(date),
            day_of_week: None,
        },
    )
    .await?;
    Ok(Json(AvailabilityDayResponse { rule, slots }))
}

/// List a vendor's bookable slots, optionally filtered by date or weekday.
pub async fn list_slots(
    State(state): State<AppState>,
    Path(vendor_id): Path<i64>,
    Query(query): Query<SlotsQuery>,
) -> HandlerResult<SlotListResponse> {
    let slots = services::slots::list_active_slots(
        &*state.repository,
        VendorId::new(vendor_id),
        SlotFilter {
            date: query.date,
            day_of_week: query.day_of_week,
        },
    )
    .await?;
    let total = slots.len();
    Ok(Json(SlotListResponse { slots, total }))
}

/// Apply a status to a batch of slots.
pub async fn set_slot_status(
    State(state): State<AppState>,
    Path(vendor_id): Path<i64>,
    Json(request): Json<SlotStatusRequest>,
) -> HandlerResult<BatchStatusResponse> {
    let affected = services::slots::bulk_set_slot_status(
        &*state.repository,
        VendorId::new(vendor_id),
        &request.slot_ids,
        request.status,
        request.force,
    )
    .await?;
    Ok(Json(BatchStatusResponse { affected }))
}

/// Reserve a slot and create the booking holding it.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ReservationOutcome>), AppError> {
    let outcome = services::reservation::reserve(
        &*state.repository,
        VendorId::new(request.vendor_id),
        request.date,
        request.start_time,
        request.duration_minutes,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Cancel a booking and release its reservation.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
) -> HandlerResult<Booking> {
    let booking =
        services::reservation::cancel_booking(&*state.repository, BookingId::new(booking_id))
            .await?;
    Ok(Json(booking))
}

/// Move a booking to a new date and start time.
pub async fn reschedule_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    Json(request): Json<RescheduleRequest>,
) -> HandlerResult<ReservationOutcome> {
    let outcome = services::reservation::reschedule_booking(
        &*state.repository,
        BookingId::new(booking_id),
        request.date,
        request.start_time,
    )
    .await?;
    Ok(Json(outcome))
}

/// Advance a booking through its lifecycle.
pub async fn transition_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    Json(request): Json<TransitionRequest>,
) -> HandlerResult<Booking> {
    let booking = services::reservation::transition_booking(
        &*state.repository,
        BookingId::new(booking_id),
        request.status,
    )
    .await?;
    Ok(Json(booking))
}
