//! Concurrency tests for the reservation ledger.
//!
//! Many tasks race for the same `(slot, date)`; the ledger must admit
//! exactly the slot's capacity and reject the rest, with no lost or
//! phantom reservations.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use slotwise::api::VendorId;
use slotwise::db::repositories::LocalRepository;
use slotwise::db::repository::{RepositoryError, SlotRepository};
use slotwise::models::{ApplyMode, DayOfWeek};
use slotwise::services::availability::{set_schedule_at, DaySchedule, ScheduleRequest};
use slotwise::services::reservation;

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

/// Seed one ongoing Monday rule (09:00-12:00, 60-minute slots) with the
/// given per-slot capacity and return the repository.
async fn seeded_repo(max_concurrent: i32) -> Arc<LocalRepository> {
    let repo = Arc::new(LocalRepository::new());
    let request = ScheduleRequest {
        apply_mode: ApplyMode::Ongoing,
        days: vec![DaySchedule {
            day_of_week: DayOfWeek::Mon,
            start_time: time(9, 0),
            end_time: time(12, 0),
            break_times: vec![],
            default_duration: 60,
            buffer_time: 0,
            max_concurrent,
        }],
    };
    let outcome = set_schedule_at(&*repo, VendorId::new(1), request, today())
        .await
        .unwrap();
    assert_eq!(outcome.slots_created, 3);
    repo
}

#[tokio::test]
async fn racing_tasks_never_exceed_capacity() {
    let capacity = 2;
    let contenders = 8;
    let repo = seeded_repo(capacity).await;
    let target = date(2026, 9, 14);

    let mut handles = Vec::new();
    for _ in 0..contenders {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            reservation::reserve(&*repo, VendorId::new(1), target, time(9, 0), None).await
        }));
    }

    let mut won = 0;
    let mut capacity_rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert_eq!(outcome.booking.scheduled_date, target);
                won += 1;
            }
            Err(RepositoryError::CapacityExceeded { .. }) => capacity_rejections += 1,
            Err(other) => panic!("unexpected error under contention: {}", other),
        }
    }

    assert_eq!(won, capacity as usize);
    assert_eq!(capacity_rejections, contenders - capacity as usize);

    // The ledger agrees with the winners.
    let slot = repo
        .find_slot(VendorId::new(1), DayOfWeek::Mon, time(9, 0))
        .await
        .unwrap()
        .unwrap();
    let count = repo
        .reservation_count(slot.id.unwrap(), target)
        .await
        .unwrap();
    assert_eq!(count, capacity);
}

#[tokio::test]
async fn races_on_different_dates_do_not_interfere() {
    let repo = seeded_repo(1).await;
    let mondays = [date(2026, 9, 14), date(2026, 9, 21), date(2026, 9, 28)];

    let mut handles = Vec::new();
    for target in mondays {
        for _ in 0..4 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                reservation::reserve(&*repo, VendorId::new(1), target, time(10, 0), None)
                    .await
                    .map(|o| o.booking.scheduled_date)
            }));
        }
    }

    let mut winners: Vec<NaiveDate> = Vec::new();
    for handle in handles {
        if let Ok(won_date) = handle.await.unwrap() {
            winners.push(won_date);
        }
    }

    // Exactly one winner per date: contention on one Monday never
    // consumes capacity on another.
    winners.sort();
    assert_eq!(winners, mondays);
}

#[tokio::test]
async fn cancelled_capacity_is_immediately_reusable_under_contention() {
    let repo = seeded_repo(1).await;
    let target = date(2026, 9, 14);

    let first = reservation::reserve(&*repo, VendorId::new(1), target, time(11, 0), None)
        .await
        .unwrap();
    let blocked = reservation::reserve(&*repo, VendorId::new(1), target, time(11, 0), None).await;
    assert!(matches!(
        blocked,
        Err(RepositoryError::CapacityExceeded { .. })
    ));

    reservation::cancel_booking(&*repo, first.booking.id.unwrap())
        .await
        .unwrap();

    let retaken = reservation::reserve(&*repo, VendorId::new(1), target, time(11, 0), None)
        .await
        .unwrap();
    assert_ne!(retaken.booking.id, first.booking.id);
}
