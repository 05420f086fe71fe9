//! Booking reservation engine.
//!
//! All capacity changes go through the repository's atomic `(slot, date)`
//! ledger operations; this module sequences them so partial failures
//! never leak a reservation. The ordering rules are:
//!
//! - reserve THEN create the booking, compensating with a release if the
//!   insert fails;
//! - reschedule reserves the new slot FIRST and only then releases the
//!   old one;
//! - cancel validates the transition, flips the status, then releases.

use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::api::{BookingId, VendorId};
use crate::db::repository::{ErrorContext, FullRepository, RepositoryError, RepositoryResult};
use crate::models::{
    normalize_breaks, Booking, BookingStatus, DayOfWeek, RecurringAvailability, SlotInstance,
};
use crate::services::availability;

/// A successful reservation: the stored booking and the slot it
/// consumed, with the post-reserve ledger count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationOutcome {
    pub booking: Booking,
    pub slot: SlotInstance,
}

/// A slot is only bookable while it fits the rule governing the date:
/// inside the working hours and clear of every break. Stale templates
/// from a superseded or narrowed rule fail this check even when they
/// survived cleanup.
fn slot_fits_rule(rule: &RecurringAvailability, slot: &SlotInstance) -> bool {
    let range = slot.time_range();
    rule.working_hours().contains(&range)
        && !normalize_breaks(&rule.break_times)
            .iter()
            .any(|b| b.overlaps(&range))
}

/// Reserve a slot and create the booking that holds it.
///
/// Resolution order: active rule for the date, then the slot matching
/// `(vendor, weekday, start_time)`, then one atomic ledger increment.
/// `duration_minutes` defaults to the slot's span; a mismatching value
/// is rejected before any capacity is touched.
pub async fn reserve(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: Option<i32>,
) -> RepositoryResult<ReservationOutcome> {
    // A date no active rule governs is not bookable, even if stale
    // slots still exist for its weekday.
    let rule = availability::resolve_for_date(repo, vendor_id, date).await?;

    let day = DayOfWeek::of_date(date);
    let slot = repo
        .find_slot(vendor_id, day, start_time)
        .await?
        .filter(|s| s.is_available && slot_fits_rule(&rule, s))
        .ok_or_else(|| {
            RepositoryError::no_availability_with_context(
                format!(
                    "No open slot at {} on {} for vendor {}",
                    start_time, date, vendor_id
                ),
                ErrorContext::new("reserve")
                    .with_entity("slot_instance")
                    .with_entity_id(vendor_id.value()),
            )
        })?;

    let slot_span = (slot.end_time - slot.start_time).num_minutes() as i32;
    let duration = duration_minutes.unwrap_or(slot_span);
    if duration != slot_span {
        return Err(RepositoryError::validation(format!(
            "requested duration {} does not match the {}-minute slot",
            duration, slot_span
        )));
    }

    let slot_id = slot.id.ok_or_else(|| {
        RepositoryError::internal("stored slot is missing its id")
    })?;
    let count = repo.reserve(slot_id, date).await?;

    let booking = Booking {
        id: None,
        vendor_id,
        slot_id,
        scheduled_date: date,
        start_time,
        duration_minutes: duration,
        status: BookingStatus::Pending,
    };

    let booking_id = match repo.insert_booking(&booking).await {
        Ok(id) => id,
        Err(e) => {
            // Hand the unit back so a failed insert cannot strand
            // capacity.
            if let Err(release_err) = repo.release(slot_id, date).await {
                warn!(
                    "failed to release slot {} on {} after booking insert error: {}",
                    slot_id, date, release_err
                );
            }
            return Err(e);
        }
    };

    info!(
        "booking {} reserved slot {} on {} ({}/{} taken)",
        booking_id, slot_id, date, count, slot.max_bookings
    );

    Ok(ReservationOutcome {
        booking: Booking {
            id: Some(booking_id),
            ..booking
        },
        slot: SlotInstance {
            reservation_count: count,
            ..slot
        },
    })
}

/// Cancel a booking and release its reservation.
///
/// Cancelling an already-terminal booking is a `Conflict`. The status
/// flips before the release; the release itself cannot fail on a
/// populated ledger and is idempotent besides.
pub async fn cancel_booking(
    repo: &dyn FullRepository,
    booking_id: BookingId,
) -> RepositoryResult<Booking> {
    let mut booking = repo.get_booking(booking_id).await?;

    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(RepositoryError::conflict_with_context(
            format!(
                "Booking {} cannot be cancelled from status {}",
                booking_id, booking.status
            ),
            ErrorContext::new("cancel_booking")
                .with_entity("booking")
                .with_entity_id(booking_id.value()),
        ));
    }

    booking.status = BookingStatus::Cancelled;
    repo.update_booking(&booking).await?;
    repo.release(booking.slot_id, booking.scheduled_date).await?;

    info!(
        "booking {} cancelled; released slot {} on {}",
        booking_id, booking.slot_id, booking.scheduled_date
    );
    Ok(booking)
}

/// Move a booking to a new date/time.
///
/// The new reservation is taken FIRST; only on success are the old unit
/// released and the booking updated. A failed new reservation leaves
/// the original untouched.
pub async fn reschedule_booking(
    repo: &dyn FullRepository,
    booking_id: BookingId,
    new_date: NaiveDate,
    new_start: NaiveTime,
) -> RepositoryResult<ReservationOutcome> {
    let booking = repo.get_booking(booking_id).await?;

    if booking.status.is_terminal() {
        return Err(RepositoryError::conflict_with_context(
            format!(
                "Booking {} cannot be rescheduled from status {}",
                booking_id, booking.status
            ),
            ErrorContext::new("reschedule_booking")
                .with_entity("booking")
                .with_entity_id(booking_id.value()),
        ));
    }

    let rule = availability::resolve_for_date(repo, booking.vendor_id, new_date).await?;

    let day = DayOfWeek::of_date(new_date);
    let new_slot = repo
        .find_slot(booking.vendor_id, day, new_start)
        .await?
        .filter(|s| s.is_available && slot_fits_rule(&rule, s))
        .ok_or_else(|| {
            RepositoryError::no_availability_with_context(
                format!(
                    "No open slot at {} on {} for vendor {}",
                    new_start, new_date, booking.vendor_id
                ),
                ErrorContext::new("reschedule_booking")
                    .with_entity("slot_instance")
                    .with_entity_id(booking.vendor_id.value()),
            )
        })?;

    let new_slot_id = new_slot.id.ok_or_else(|| {
        RepositoryError::internal("stored slot is missing its id")
    })?;
    let count = repo.reserve(new_slot_id, new_date).await?;

    let old_slot_id = booking.slot_id;
    let old_date = booking.scheduled_date;

    let updated = Booking {
        slot_id: new_slot_id,
        scheduled_date: new_date,
        start_time: new_start,
        duration_minutes: (new_slot.end_time - new_slot.start_time).num_minutes() as i32,
        ..booking
    };
    if let Err(e) = repo.update_booking(&updated).await {
        if let Err(release_err) = repo.release(new_slot_id, new_date).await {
            warn!(
                "failed to release slot {} on {} after reschedule update error: {}",
                new_slot_id, new_date, release_err
            );
        }
        return Err(e);
    }

    repo.release(old_slot_id, old_date).await?;

    info!(
        "booking {} moved from slot {} on {} to slot {} on {}",
        booking_id, old_slot_id, old_date, new_slot_id, new_date
    );

    Ok(ReservationOutcome {
        booking: updated,
        slot: SlotInstance {
            reservation_count: count,
            ..new_slot
        },
    })
}

/// Advance a booking through its lifecycle.
///
/// Illegal transitions are `Conflict`. Transitioning to `cancelled`
/// releases the reservation, same as [`cancel_booking`]; completing a
/// booking consumes it without a release.
pub async fn transition_booking(
    repo: &dyn FullRepository,
    booking_id: BookingId,
    new_status: BookingStatus,
) -> RepositoryResult<Booking> {
    if new_status == BookingStatus::Cancelled {
        return cancel_booking(repo, booking_id).await;
    }

    let mut booking = repo.get_booking(booking_id).await?;
    if !booking.status.can_transition_to(new_status) {
        return Err(RepositoryError::conflict_with_context(
            format!(
                "Booking {} cannot move from {} to {}",
                booking_id, booking.status, new_status
            ),
            ErrorContext::new("transition_booking")
                .with_entity("booking")
                .with_entity_id(booking_id.value()),
        ));
    }

    booking.status = new_status;
    repo.update_booking(&booking).await?;
    info!("booking {} is now {}", booking_id, new_status);
    Ok(booking)
}
