use chrono::{NaiveDate, NaiveTime};

use crate::api::VendorId;
use crate::db::repository::{AvailabilityRepository, RepositoryError, SlotRepository};
use crate::db::repositories::LocalRepository;
use crate::models::{ApplyMode, DayOfWeek, TimeRange};
use crate::services::availability::{
    resolve_for_date, set_rules_status, set_schedule_at, update_rule, DaySchedule, RulePatch,
    RuleStatusAction, ScheduleRequest,
};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// 2026-09-07 is a Monday
fn today() -> NaiveDate {
    d(2026, 9, 7)
}

fn monday_nine_to_five() -> DaySchedule {
    DaySchedule {
        day_of_week: DayOfWeek::Mon,
        start_time: t(9, 0),
        end_time: t(17, 0),
        break_times: vec![TimeRange::new(t(12, 0), t(13, 0))],
        default_duration: 60,
        buffer_time: 15,
        max_concurrent: 1,
    }
}

fn ongoing(days: Vec<DaySchedule>) -> ScheduleRequest {
    ScheduleRequest {
        apply_mode: ApplyMode::Ongoing,
        days,
    }
}

#[tokio::test]
async fn set_schedule_materializes_slots() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    let outcome = set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    assert_eq!(outcome.rule_ids.len(), 1);
    assert_eq!(outcome.slots_created, 4);
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn invalid_day_aborts_whole_batch() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    let mut bad = monday_nine_to_five();
    bad.day_of_week = DayOfWeek::Tue;
    bad.default_duration = 5; // below minimum

    let result = set_schedule_at(
        &repo,
        vendor,
        ongoing(vec![monday_nine_to_five(), bad]),
        today(),
    )
    .await;

    assert!(matches!(result, Err(RepositoryError::Validation { .. })));
    assert!(repo.list_rules(vendor).await.unwrap().is_empty());
}

#[tokio::test]
async fn date_range_cannot_start_in_the_past() {
    let repo = LocalRepository::new();
    let request = ScheduleRequest {
        apply_mode: ApplyMode::DateRange {
            start: d(2026, 9, 1),
            end: d(2026, 9, 30),
        },
        days: vec![monday_nine_to_five()],
    };

    let result = set_schedule_at(&repo, VendorId(1), request, today()).await;
    assert!(matches!(result, Err(RepositoryError::Validation { .. })));
}

#[tokio::test]
async fn ongoing_resubmission_supersedes_prior_rule() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    let mut later = monday_nine_to_five();
    later.start_time = t(10, 0);
    set_schedule_at(&repo, vendor, ongoing(vec![later]), today())
        .await
        .unwrap();

    let active: Vec<_> = repo
        .list_rules(vendor)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.is_active && r.is_ongoing())
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].start_time, t(10, 0));
}

#[tokio::test]
async fn update_rule_regenerates_slots() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    let outcome = set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();
    let rule_id = outcome.rule_ids[0];

    // Two-hour slots fit the same window differently
    let patch = RulePatch {
        default_duration: Some(120),
        buffer_time: Some(0),
        break_times: Some(Vec::new()),
        ..Default::default()
    };
    let outcome = update_rule(&repo, vendor, rule_id, patch).await.unwrap();
    assert_eq!(outcome.slots_created, 4);

    let rule = repo.get_rule(vendor, rule_id).await.unwrap();
    assert_eq!(rule.default_duration, 120);
}

#[tokio::test]
async fn update_rule_rejects_foreign_vendor() {
    let repo = LocalRepository::new();
    let outcome = set_schedule_at(
        &repo,
        VendorId(1),
        ongoing(vec![monday_nine_to_five()]),
        today(),
    )
    .await
    .unwrap();

    let result = update_rule(
        &repo,
        VendorId(2),
        outcome.rule_ids[0],
        RulePatch {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
}

#[tokio::test]
async fn deactivated_rule_no_longer_resolves() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    let outcome = set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    assert!(resolve_for_date(&repo, vendor, today()).await.is_ok());

    let affected = set_rules_status(
        &repo,
        vendor,
        &outcome.rule_ids,
        RuleStatusAction::Deactivate,
    )
    .await
    .unwrap();
    assert_eq!(affected, 1);

    let result = resolve_for_date(&repo, vendor, today()).await;
    assert!(matches!(result, Err(RepositoryError::NoAvailability { .. })));
}

#[tokio::test]
async fn resolve_prefers_narrower_window() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    // A one-week override for the same weekday
    let mut short_day = monday_nine_to_five();
    short_day.start_time = t(11, 0);
    let request = ScheduleRequest {
        apply_mode: ApplyMode::DateRange {
            start: d(2026, 9, 7),
            end: d(2026, 9, 13),
        },
        days: vec![short_day],
    };
    set_schedule_at(&repo, vendor, request, today())
        .await
        .unwrap();

    let rule = resolve_for_date(&repo, vendor, d(2026, 9, 7)).await.unwrap();
    assert_eq!(rule.start_time, t(11, 0));

    // Past the override window the ongoing rule applies again
    let rule = resolve_for_date(&repo, vendor, d(2026, 9, 14)).await.unwrap();
    assert_eq!(rule.start_time, t(9, 0));
}

#[tokio::test]
async fn regeneration_keeps_booked_slots() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    let slot = repo
        .find_slot(vendor, DayOfWeek::Mon, t(9, 0))
        .await
        .unwrap()
        .unwrap();
    repo.reserve(slot.id.unwrap(), d(2026, 9, 14)).await.unwrap();

    // Resubmitting the same template regenerates around the booked slot
    let outcome = set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].detail.contains("live reservation"));
    assert_eq!(outcome.slots_created, 3);

    // The booked slot survived with its ledger intact
    let count = repo
        .reservation_count(slot.id.unwrap(), d(2026, 9, 14))
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn superseding_with_narrower_hours_clears_old_slots() {
    let repo = LocalRepository::new();
    let vendor = VendorId(1);

    set_schedule_at(&repo, vendor, ongoing(vec![monday_nine_to_five()]), today())
        .await
        .unwrap();

    let narrow = DaySchedule {
        day_of_week: DayOfWeek::Mon,
        start_time: t(10, 0),
        end_time: t(12, 0),
        break_times: vec![],
        default_duration: 60,
        buffer_time: 0,
        max_concurrent: 1,
    };
    let outcome = set_schedule_at(&repo, vendor, ongoing(vec![narrow]), today())
        .await
        .unwrap();
    assert_eq!(outcome.slots_created, 2);

    // The superseded rule's afternoon template is gone, not just shadowed.
    let stale = repo.find_slot(vendor, DayOfWeek::Mon, t(14, 0)).await.unwrap();
    assert!(stale.is_none());
    let fresh = repo.find_slot(vendor, DayOfWeek::Mon, t(10, 0)).await.unwrap();
    assert!(fresh.is_some());
}
