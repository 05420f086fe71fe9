//! End-to-end scheduling flows against the in-memory repository.
//!
//! These walk the full path a vendor and a customer take: publish a
//! weekly schedule, browse the materialized slots, book, move the
//! booking around, and drive it through its lifecycle.

use chrono::{NaiveDate, NaiveTime};

use slotwise::api::VendorId;
use slotwise::db::repositories::LocalRepository;
use slotwise::db::repository::{RepositoryError, SlotFilter};
use slotwise::models::{ApplyMode, BookingStatus, DayOfWeek, SlotStatus};
use slotwise::services::availability::{
    resolve_for_date, set_rules_status, set_schedule_at, DaySchedule, RuleStatusAction,
    ScheduleRequest,
};
use slotwise::services::reservation;
use slotwise::services::slots;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, min, 0).unwrap()
}

/// Monday 2026-09-07.
fn today() -> NaiveDate {
    date(2026, 9, 7)
}

fn day(d: DayOfWeek, start: NaiveTime, end: NaiveTime) -> DaySchedule {
    DaySchedule {
        day_of_week: d,
        start_time: start,
        end_time: end,
        break_times: vec![],
        default_duration: 60,
        buffer_time: 0,
        max_concurrent: 1,
    }
}

#[tokio::test]
async fn publish_browse_book_and_complete() {
    let repo = LocalRepository::new();
    let vendor = VendorId::new(7);

    // Monday and Wednesday mornings, ongoing.
    let outcome = set_schedule_at(
        &repo,
        vendor,
        ScheduleRequest {
            apply_mode: ApplyMode::Ongoing,
            days: vec![
                day(DayOfWeek::Mon, time(9, 0), time(12, 0)),
                day(DayOfWeek::Wed, time(14, 0), time(17, 0)),
            ],
        },
        today(),
    )
    .await
    .unwrap();
    assert_eq!(outcome.rule_ids.len(), 2);
    assert_eq!(outcome.slots_created, 6);
    assert!(outcome.warnings.is_empty());

    // Browsing by weekday shows the Monday template.
    let monday_slots = slots::list_active_slots(
        &repo,
        vendor,
        SlotFilter {
            date: None,
            day_of_week: Some(DayOfWeek::Mon),
        },
    )
    .await
    .unwrap();
    assert_eq!(monday_slots.len(), 3);

    // Book Wednesday 14:00.
    let wednesday = date(2026, 9, 9);
    let reserved = reservation::reserve(&repo, vendor, wednesday, time(14, 0), None)
        .await
        .unwrap();
    assert_eq!(reserved.booking.status, BookingStatus::Pending);
    assert_eq!(reserved.booking.duration_minutes, 60);
    assert_eq!(reserved.slot.reservation_count, 1);

    // Drive it through the lifecycle to completion.
    let booking_id = reserved.booking.id.unwrap();
    for status in [
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
    ] {
        let booking = reservation::transition_booking(&repo, booking_id, status)
            .await
            .unwrap();
        assert_eq!(booking.status, status);
    }

    // Completed bookings keep their reservation: the unit was consumed.
    let rebook = reservation::reserve(&repo, vendor, wednesday, time(14, 0), None).await;
    assert!(matches!(
        rebook,
        Err(RepositoryError::CapacityExceeded { .. })
    ));
}

#[tokio::test]
async fn reschedule_across_weekdays_moves_the_unit() {
    let repo = LocalRepository::new();
    let vendor = VendorId::new(7);

    set_schedule_at(
        &repo,
        vendor,
        ScheduleRequest {
            apply_mode: ApplyMode::Ongoing,
            days: vec![
                day(DayOfWeek::Mon, time(9, 0), time(12, 0)),
                day(DayOfWeek::Fri, time(9, 0), time(12, 0)),
            ],
        },
        today(),
    )
    .await
    .unwrap();

    let monday = date(2026, 9, 14);
    let friday = date(2026, 9, 11);

    let original = reservation::reserve(&repo, vendor, monday, time(9, 0), None)
        .await
        .unwrap();
    let booking_id = original.booking.id.unwrap();

    let moved = reservation::reschedule_booking(&repo, booking_id, friday, time(10, 0))
        .await
        .unwrap();
    assert_eq!(moved.booking.id, Some(booking_id));
    assert_eq!(moved.booking.scheduled_date, friday);
    assert_eq!(moved.booking.start_time, time(10, 0));

    // The Monday unit is free again.
    reservation::reserve(&repo, vendor, monday, time(9, 0), None)
        .await
        .unwrap();
    // The Friday unit is taken.
    let friday_again = reservation::reserve(&repo, vendor, friday, time(10, 0), None).await;
    assert!(matches!(
        friday_again,
        Err(RepositoryError::CapacityExceeded { .. })
    ));
}

#[tokio::test]
async fn date_range_override_shadows_the_ongoing_rule() {
    let repo = LocalRepository::new();
    let vendor = VendorId::new(7);

    set_schedule_at(
        &repo,
        vendor,
        ScheduleRequest {
            apply_mode: ApplyMode::Ongoing,
            days: vec![day(DayOfWeek::Tue, time(9, 0), time(17, 0))],
        },
        today(),
    )
    .await
    .unwrap();

    // Reduced hours for one week.
    set_schedule_at(
        &repo,
        vendor,
        ScheduleRequest {
            apply_mode: ApplyMode::DateRange {
                start: date(2026, 9, 14),
                end: date(2026, 9, 20),
            },
            days: vec![day(DayOfWeek::Tue, time(9, 0), time(11, 0))],
        },
        today(),
    )
    .await
    .unwrap();

    let inside = resolve_for_date(&repo, vendor, date(2026, 9, 15)).await.unwrap();
    assert_eq!(inside.end_time, time(11, 0));

    let outside = resolve_for_date(&repo, vendor, date(2026, 9, 22)).await.unwrap();
    assert_eq!(outside.end_time, time(17, 0));
    assert!(outside.is_ongoing());
}

#[tokio::test]
async fn deleting_rules_stops_resolution_but_keeps_history_clean() {
    let repo = LocalRepository::new();
    let vendor = VendorId::new(7);

    let outcome = set_schedule_at(
        &repo,
        vendor,
        ScheduleRequest {
            apply_mode: ApplyMode::Ongoing,
            days: vec![day(DayOfWeek::Thu, time(9, 0), time(12, 0))],
        },
        today(),
    )
    .await
    .unwrap();

    let affected = set_rules_status(&repo, vendor, &outcome.rule_ids, RuleStatusAction::Delete)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let resolved = resolve_for_date(&repo, vendor, date(2026, 9, 10)).await;
    assert!(matches!(
        resolved,
        Err(RepositoryError::NoAvailability { .. })
    ));
}

#[tokio::test]
async fn deleting_slots_with_live_reservations_requires_force() {
    let repo = LocalRepository::new();
    let vendor = VendorId::new(7);

    set_schedule_at(
        &repo,
        vendor,
        ScheduleRequest {
            apply_mode: ApplyMode::Ongoing,
            days: vec![day(DayOfWeek::Mon, time(9, 0), time(11, 0))],
        },
        today(),
    )
    .await
    .unwrap();

    let reserved = reservation::reserve(&repo, vendor, date(2026, 9, 14), time(9, 0), None)
        .await
        .unwrap();
    let slot_id = reserved.slot.id.unwrap();

    let refused =
        slots::bulk_set_slot_status(&repo, vendor, &[slot_id], SlotStatus::Deleted, false).await;
    assert!(matches!(refused, Err(RepositoryError::Conflict { .. })));

    let forced = slots::bulk_set_slot_status(&repo, vendor, &[slot_id], SlotStatus::Deleted, true)
        .await
        .unwrap();
    assert_eq!(forced, 1);
}
