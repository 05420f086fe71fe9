use chrono::{NaiveDate, NaiveTime};

use crate::api::VendorId;
use crate::db::repository::{BookingRepository, RepositoryError, SlotRepository};
use crate::db::repositories::LocalRepository;
use crate::models::{ApplyMode, BookingStatus, DayOfWeek, SlotInstance, TimeRange};
use crate::services::availability::{set_schedule_at, DaySchedule, ScheduleRequest};
use crate::services::reservation::{
    cancel_booking, reschedule_booking, reserve, transition_booking,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// 2026-09-07 is a Monday
fn monday() -> NaiveDate {
    d(2026, 9, 7)
}

async fn seeded_repo(max_concurrent: i32) -> (LocalRepository, VendorId) {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);
    let request = ScheduleRequest {
        apply_mode: ApplyMode::Ongoing,
        days: vec![DaySchedule {
            day_of_week: DayOfWeek::Mon,
            start_time: t(9, 0),
            end_time: t(17, 0),
            break_times: vec![TimeRange::new(t(12, 0), t(13, 0))],
            default_duration: 60,
            buffer_time: 15,
            max_concurrent,
        }],
    };
    set_schedule_at(&repo, vendor, request, monday())
        .await
        .unwrap();
    (repo, vendor)
}

#[tokio::test]
async fn reserve_creates_pending_booking() {
    let (repo, vendor) = seeded_repo(1).await;

    let outcome = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();

    assert_eq!(outcome.booking.status, BookingStatus::Pending);
    assert_eq!(outcome.booking.scheduled_date, monday());
    assert_eq!(outcome.booking.duration_minutes, 60);
    assert_eq!(outcome.slot.reservation_count, 1);
    assert!(outcome.booking.id.is_some());
}

#[tokio::test]
async fn full_slot_rejects_with_capacity_exceeded() {
    let (repo, vendor) = seeded_repo(1).await;

    reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let second = reserve(&repo, vendor, monday(), t(9, 0), None).await;
    assert!(matches!(
        second,
        Err(RepositoryError::CapacityExceeded { .. })
    ));
}

#[tokio::test]
async fn same_weekday_different_dates_do_not_contend() {
    let (repo, vendor) = seeded_repo(1).await;

    reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let next_week = reserve(&repo, vendor, d(2026, 9, 14), t(9, 0), None).await;
    assert!(next_week.is_ok());
}

#[tokio::test]
async fn concurrent_capacity_allows_multiple_bookings() {
    let (repo, vendor) = seeded_repo(2).await;

    let first = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let second = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    assert_eq!(first.slot.reservation_count, 1);
    assert_eq!(second.slot.reservation_count, 2);

    let third = reserve(&repo, vendor, monday(), t(9, 0), None).await;
    assert!(matches!(
        third,
        Err(RepositoryError::CapacityExceeded { .. })
    ));
}

#[tokio::test]
async fn date_without_rule_is_no_availability() {
    let (repo, vendor) = seeded_repo(1).await;

    // Tuesday has no rule
    let result = reserve(&repo, vendor, d(2026, 9, 8), t(9, 0), None).await;
    assert!(matches!(
        result,
        Err(RepositoryError::NoAvailability { .. })
    ));
}

#[tokio::test]
async fn start_time_off_grid_is_no_availability() {
    let (repo, vendor) = seeded_repo(1).await;

    let result = reserve(&repo, vendor, monday(), t(9, 30), None).await;
    assert!(matches!(
        result,
        Err(RepositoryError::NoAvailability { .. })
    ));
}

#[tokio::test]
async fn mismatched_duration_is_rejected_before_reserving() {
    let (repo, vendor) = seeded_repo(1).await;

    let result = reserve(&repo, vendor, monday(), t(9, 0), Some(90)).await;
    assert!(matches!(result, Err(RepositoryError::Validation { .. })));

    // Capacity must be untouched by the failed attempt
    let outcome = reserve(&repo, vendor, monday(), t(9, 0), Some(60)).await.unwrap();
    assert_eq!(outcome.slot.reservation_count, 1);
}

#[tokio::test]
async fn cancel_releases_capacity() {
    let (repo, vendor) = seeded_repo(1).await;

    let outcome = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let booking_id = outcome.booking.id.unwrap();

    let cancelled = cancel_booking(&repo, booking_id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // The unit is bookable again
    assert!(reserve(&repo, vendor, monday(), t(9, 0), None).await.is_ok());
}

#[tokio::test]
async fn cancel_twice_is_conflict() {
    let (repo, vendor) = seeded_repo(1).await;

    let outcome = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let booking_id = outcome.booking.id.unwrap();

    cancel_booking(&repo, booking_id).await.unwrap();
    let again = cancel_booking(&repo, booking_id).await;
    assert!(matches!(again, Err(RepositoryError::Conflict { .. })));

    // The double-cancel must not release a second unit
    let slot_id = outcome.booking.slot_id;
    assert_eq!(repo.reservation_count(slot_id, monday()).await.unwrap(), 0);
}

#[tokio::test]
async fn lifecycle_transitions_in_order() {
    let (repo, vendor) = seeded_repo(1).await;
    let booking_id = reserve(&repo, vendor, monday(), t(9, 0), None)
        .await
        .unwrap()
        .booking
        .id
        .unwrap();

    for status in [
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
    ] {
        let updated = transition_booking(&repo, booking_id, status).await.unwrap();
        assert_eq!(updated.status, status);
    }

    // Completed is terminal
    let result = cancel_booking(&repo, booking_id).await;
    assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
}

#[tokio::test]
async fn skipping_states_is_conflict() {
    let (repo, vendor) = seeded_repo(1).await;
    let booking_id = reserve(&repo, vendor, monday(), t(9, 0), None)
        .await
        .unwrap()
        .booking
        .id
        .unwrap();

    let result = transition_booking(&repo, booking_id, BookingStatus::Completed).await;
    assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
    assert_eq!(
        repo.get_booking(booking_id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn reschedule_moves_the_reservation() {
    let (repo, vendor) = seeded_repo(1).await;

    let original = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let booking_id = original.booking.id.unwrap();
    let old_slot = original.booking.slot_id;

    let moved = reschedule_booking(&repo, booking_id, monday(), t(10, 15))
        .await
        .unwrap();
    assert_eq!(moved.booking.start_time, t(10, 15));
    assert_eq!(moved.slot.reservation_count, 1);

    // The old unit is free again, the new one is taken
    assert_eq!(repo.reservation_count(old_slot, monday()).await.unwrap(), 0);
    assert!(reserve(&repo, vendor, monday(), t(9, 0), None).await.is_ok());
}

#[tokio::test]
async fn failed_reschedule_keeps_original_reservation() {
    let (repo, vendor) = seeded_repo(1).await;

    // Fill the target slot first
    reserve(&repo, vendor, monday(), t(10, 15), None).await.unwrap();

    let original = reserve(&repo, vendor, monday(), t(9, 0), None).await.unwrap();
    let booking_id = original.booking.id.unwrap();

    let result = reschedule_booking(&repo, booking_id, monday(), t(10, 15)).await;
    assert!(matches!(
        result,
        Err(RepositoryError::CapacityExceeded { .. })
    ));

    // Original reservation untouched
    let booking = repo.get_booking(booking_id).await.unwrap();
    assert_eq!(booking.start_time, t(9, 0));
    assert_eq!(
        repo.reservation_count(booking.slot_id, monday()).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn reschedule_terminal_booking_is_conflict() {
    let (repo, vendor) = seeded_repo(1).await;

    let booking_id = reserve(&repo, vendor, monday(), t(9, 0), None)
        .await
        .unwrap()
        .booking
        .id
        .unwrap();
    cancel_booking(&repo, booking_id).await.unwrap();

    let result = reschedule_booking(&repo, booking_id, monday(), t(10, 15)).await;
    assert!(matches!(result, Err(RepositoryError::Conflict { .. })));
}

#[tokio::test]
async fn stale_slot_outside_active_hours_is_not_bookable() {
    let (repo, vendor) = seeded_repo(1).await;

    // A leftover template past the rule's 17:00 close.
    repo.insert_slots(&[SlotInstance {
        id: None,
        vendor_id: vendor,
        service_id: None,
        day_of_week: DayOfWeek::Mon,
        start_time: t(18, 0),
        end_time: t(19, 0),
        is_available: true,
        max_bookings: 1,
        reservation_count: 0,
    }])
    .await
    .unwrap();

    let attempt = reserve(&repo, vendor, monday(), t(18, 0), None).await;
    assert!(matches!(
        attempt,
        Err(RepositoryError::NoAvailability { .. })
    ));
}

#[tokio::test]
async fn stale_slot_overlapping_a_break_is_not_bookable() {
    let (repo, vendor) = seeded_repo(1).await;

    // A leftover template sitting on the 12:00-13:00 break.
    repo.insert_slots(&[SlotInstance {
        id: None,
        vendor_id: vendor,
        service_id: None,
        day_of_week: DayOfWeek::Mon,
        start_time: t(12, 0),
        end_time: t(13, 0),
        is_available: true,
        max_bookings: 1,
        reservation_count: 0,
    }])
    .await
    .unwrap();

    let attempt = reserve(&repo, vendor, monday(), t(12, 0), None).await;
    assert!(matches!(
        attempt,
        Err(RepositoryError::NoAvailability { .. })
    ));
}

#[tokio::test]
async fn superseded_hours_are_no_longer_bookable() {
    let (repo, vendor) = seeded_repo(1).await;

    // Narrow the vendor's Monday to 10:00-12:00.
    let request = ScheduleRequest {
        apply_mode: ApplyMode::Ongoing,
        days: vec![DaySchedule {
            day_of_week: DayOfWeek::Mon,
            start_time: t(10, 0),
            end_time: t(12, 0),
            break_times: vec![],
            default_duration: 60,
            buffer_time: 0,
            max_concurrent: 1,
        }],
    };
    set_schedule_at(&repo, vendor, request, monday())
        .await
        .unwrap();

    // 14:00 belonged to the superseded 9-to-5 rule only.
    let afternoon = reserve(&repo, vendor, d(2026, 9, 14), t(14, 0), None).await;
    assert!(matches!(
        afternoon,
        Err(RepositoryError::NoAvailability { .. })
    ));

    // The narrowed hours still book normally.
    let morning = reserve(&repo, vendor, d(2026, 9, 14), t(10, 0), None).await;
    assert!(morning.is_ok());
}
