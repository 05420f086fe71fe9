//! Recurring availability orchestration.
//!
//! Validation, supersede semantics and slot materialization for vendor
//! schedules. Rule mutations are all-or-nothing; slot generation runs
//! after the applying mutation and reports per-day problems as
//! [`GenerationWarning`]s rather than failing the whole request.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::api::{GenerationWarning, RuleId, ScheduleOutcome, VendorId};
use crate::db::repository::{ErrorContext, FullRepository, RepositoryError, RepositoryResult};
use crate::models::{ApplyMode, DayOfWeek, FieldError, RecurringAvailability, TimeRange};
use crate::services::slot_generator;

/// How far ahead slots are materialized for an open-ended rule.
pub const DEFAULT_HORIZON_WEEKS: u32 = 8;

/// One weekday's working template inside a schedule request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub break_times: Vec<TimeRange>,
    pub default_duration: i32,
    pub buffer_time: i32,
    #[serde(default = "default_concurrency")]
    pub max_concurrent: i32,
}

fn default_concurrency() -> i32 {
    1
}

/// A vendor's schedule submission: one or more weekday templates plus
/// how they apply over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub apply_mode: ApplyMode,
    pub days: Vec<DaySchedule>,
}

/// Partial update to one rule's scheduling fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePatch {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_times: Option<Vec<TimeRange>>,
    pub default_duration: Option<i32>,
    pub buffer_time: Option<i32>,
    pub max_concurrent: Option<i32>,
    pub is_active: Option<bool>,
}

impl RulePatch {
    /// Whether the patch touches a field that invalidates materialized
    /// slots.
    pub fn changes_schedule(&self) -> bool {
        self.start_time.is_some()
            || self.end_time.is_some()
            || self.break_times.is_some()
            || self.default_duration.is_some()
            || self.buffer_time.is_some()
            || self.max_concurrent.is_some()
    }

    fn apply(&self, rule: &mut RecurringAvailability) {
        if let Some(v) = self.start_time {
            rule.start_time = v;
        }
        if let Some(v) = self.end_time {
            rule.end_time = v;
        }
        if let Some(v) = &self.break_times {
            rule.break_times = v.clone();
        }
        if let Some(v) = self.default_duration {
            rule.default_duration = v;
        }
        if let Some(v) = self.buffer_time {
            rule.buffer_time = v;
        }
        if let Some(v) = self.max_concurrent {
            rule.max_concurrent = v;
        }
        if let Some(v) = self.is_active {
            rule.is_active = v;
        }
    }
}

/// Batch action for [`set_rules_status`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatusAction {
    Activate,
    Deactivate,
    Delete,
}

/// Store a vendor's schedule and materialize its slots.
///
/// Ongoing mode supersedes any prior ongoing rule per weekday in the
/// same transaction as the insert. The whole batch is validated first;
/// one invalid day aborts everything with no mutation.
pub async fn set_schedule(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    request: ScheduleRequest,
) -> RepositoryResult<ScheduleOutcome> {
    set_schedule_at(repo, vendor_id, request, Utc::now().date_naive()).await
}

/// [`set_schedule`] with an explicit "today" so date-dependent
/// validation stays testable.
pub async fn set_schedule_at(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    request: ScheduleRequest,
    today: NaiveDate,
) -> RepositoryResult<ScheduleOutcome> {
    let mut errors: Vec<FieldError> = Vec::new();

    let (effective_from, effective_until) = match request.apply_mode {
        ApplyMode::Ongoing => (None, None),
        ApplyMode::DateRange { start, end } => {
            if start < today {
                errors.push(FieldError::new(
                    "apply_mode.start",
                    format!("range start {} is before today {}", start, today),
                ));
            }
            if end <= start {
                errors.push(FieldError::new(
                    "apply_mode.end",
                    format!("range end {} must be after start {}", end, start),
                ));
            }
            (Some(start), Some(end))
        }
    };

    if request.days.is_empty() {
        errors.push(FieldError::new("days", "at least one day is required"));
    }

    let mut rules: Vec<RecurringAvailability> = Vec::with_capacity(request.days.len());
    for day in &request.days {
        let rule = RecurringAvailability {
            id: None,
            vendor_id,
            day_of_week: day.day_of_week,
            start_time: day.start_time,
            end_time: day.end_time,
            break_times: day.break_times.clone(),
            default_duration: day.default_duration,
            buffer_time: day.buffer_time,
            effective_from,
            effective_until,
            max_concurrent: day.max_concurrent,
            is_active: true,
        };
        if let Err(day_errors) = rule.validate() {
            errors.extend(day_errors.into_iter().map(|e| {
                FieldError::new(format!("{}.{}", day.day_of_week, e.field), e.message)
            }));
        }
        rules.push(rule);
    }

    if !errors.is_empty() {
        return Err(RepositoryError::from_field_errors(
            &errors,
            ErrorContext::new("set_schedule")
                .with_entity("availability_rule")
                .with_entity_id(vendor_id.value()),
        ));
    }

    let supersede = matches!(request.apply_mode, ApplyMode::Ongoing);
    let rule_ids = repo.insert_rules(&rules, supersede).await?;

    info!(
        "stored {} availability rule(s) for vendor {} ({} mode)",
        rule_ids.len(),
        vendor_id,
        if supersede { "ongoing" } else { "date-range" }
    );

    let mut slots_created = 0;
    let mut warnings = Vec::new();
    for (rule, id) in rules.iter_mut().zip(&rule_ids) {
        rule.id = Some(*id);
        let outcome = regenerate(repo, rule, DEFAULT_HORIZON_WEEKS, today).await?;
        slots_created += outcome.slots_created;
        warnings.extend(outcome.warnings);
    }

    Ok(ScheduleOutcome {
        rule_ids,
        slots_created,
        warnings,
    })
}

/// Patch one rule; regenerate its slots when a scheduling field changed.
pub async fn update_rule(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    rule_id: RuleId,
    patch: RulePatch,
) -> RepositoryResult<ScheduleOutcome> {
    let mut rule = repo.get_rule(vendor_id, rule_id).await?;
    patch.apply(&mut rule);

    if let Err(errors) = rule.validate() {
        return Err(RepositoryError::from_field_errors(
            &errors,
            ErrorContext::new("update_rule")
                .with_entity("availability_rule")
                .with_entity_id(rule_id.value()),
        ));
    }

    repo.update_rule(vendor_id, &rule).await?;
    info!("updated rule {} for vendor {}", rule_id, vendor_id);

    if patch.changes_schedule() {
        let outcome =
            regenerate(repo, &rule, DEFAULT_HORIZON_WEEKS, Utc::now().date_naive()).await?;
        return Ok(ScheduleOutcome {
            rule_ids: vec![rule_id],
            slots_created: outcome.slots_created,
            warnings: outcome.warnings,
        });
    }

    Ok(ScheduleOutcome {
        rule_ids: vec![rule_id],
        slots_created: 0,
        warnings: Vec::new(),
    })
}

/// Apply an activate/deactivate/delete action to a batch of rules.
///
/// Ownership of every id is checked before any mutation; one foreign or
/// missing id fails the whole batch.
pub async fn set_rules_status(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    rule_ids: &[RuleId],
    action: RuleStatusAction,
) -> RepositoryResult<usize> {
    if rule_ids.is_empty() {
        return Ok(0);
    }
    let affected = match action {
        RuleStatusAction::Activate => repo.set_rules_active(vendor_id, rule_ids, true).await?,
        RuleStatusAction::Deactivate => repo.set_rules_active(vendor_id, rule_ids, false).await?,
        RuleStatusAction::Delete => repo.delete_rules(vendor_id, rule_ids).await?,
    };
    info!(
        "{:?} applied to {} rule(s) for vendor {}",
        action, affected, vendor_id
    );
    Ok(affected)
}

/// Resolve the single active rule governing a vendor's date.
///
/// More than one applicable active rule is a data-integrity breach; the
/// narrowest effective window wins (then the lowest id) and a warning is
/// logged.
pub async fn resolve_for_date(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    date: NaiveDate,
) -> RepositoryResult<RecurringAvailability> {
    let day = DayOfWeek::of_date(date);
    let mut applicable: Vec<RecurringAvailability> = repo
        .list_active_rules_for_day(vendor_id, day)
        .await?
        .into_iter()
        .filter(|r| r.applies_on(date))
        .collect();

    if applicable.len() > 1 {
        warn!(
            "vendor {} has {} active rules covering {} on {}; picking the most specific",
            vendor_id,
            applicable.len(),
            date,
            day
        );
    }

    applicable.sort_by_key(|r| {
        (
            r.window_span_days().unwrap_or(i64::MAX),
            r.id.map(|i| i.value()).unwrap_or(i64::MAX),
        )
    });

    applicable.into_iter().next().ok_or_else(|| {
        RepositoryError::no_availability_with_context(
            format!("No availability for vendor {} on {}", vendor_id, date),
            ErrorContext::new("resolve_for_date")
                .with_entity("availability_rule")
                .with_entity_id(vendor_id.value()),
        )
    })
}

/// Rebuild the weekday template slots a rule defines.
///
/// Future unbooked slots inside the rule's working hours are replaced by
/// freshly generated ones; slots still holding live reservations are
/// left in place and reported as warnings. The first occurrence of the
/// rule's weekday inside its effective window (bounded by the horizon)
/// anchors generation; a window with no reachable occurrence produces a
/// warning and zero slots.
pub async fn regenerate(
    repo: &dyn FullRepository,
    rule: &RecurringAvailability,
    horizon_weeks: u32,
    today: NaiveDate,
) -> RepositoryResult<ScheduleOutcome> {
    let rule_ids: Vec<RuleId> = rule.id.into_iter().collect();

    let Some(anchor) = first_occurrence(rule, today, horizon_weeks) else {
        return Ok(ScheduleOutcome {
            rule_ids,
            slots_created: 0,
            warnings: vec![GenerationWarning::new(
                today,
                format!(
                    "rule for {} has no occurrence within {} week(s)",
                    rule.day_of_week, horizon_weeks
                ),
            )],
        });
    };

    let cleanup = repo
        .delete_unbooked_template_slots(rule.vendor_id, rule.day_of_week, today)
        .await?;

    let mut warnings = Vec::new();
    let mut kept_starts = Vec::with_capacity(cleanup.kept.len());
    for slot_id in &cleanup.kept {
        let slot = repo.get_slot(rule.vendor_id, *slot_id).await?;
        warnings.push(GenerationWarning::new(
            anchor,
            format!(
                "slot {} ({}-{}) kept: live reservation",
                slot_id, slot.start_time, slot.end_time
            ),
        ));
        kept_starts.push(slot.start_time);
    }

    let generated: Vec<_> = slot_generator::generate(rule, anchor)
        .into_iter()
        .filter(|s| !kept_starts.contains(&s.start_time))
        .collect();

    let slots_created = if generated.is_empty() {
        0
    } else {
        repo.insert_slots(&generated).await?.len()
    };

    info!(
        "regenerated {} slot(s) for vendor {} on {} ({} deleted, {} kept)",
        slots_created,
        rule.vendor_id,
        rule.day_of_week,
        cleanup.deleted,
        cleanup.kept.len()
    );

    Ok(ScheduleOutcome {
        rule_ids,
        slots_created,
        warnings,
    })
}

/// First date on/after `today` that the rule governs, bounded by the
/// horizon.
fn first_occurrence(
    rule: &RecurringAvailability,
    today: NaiveDate,
    horizon_weeks: u32,
) -> Option<NaiveDate> {
    let from = rule.effective_from.map_or(today, |f| f.max(today));
    let offset =
        (rule.day_of_week.index() - from.weekday().num_days_from_monday() as i32).rem_euclid(7);
    let candidate = from + Duration::days(i64::from(offset));

    let mut bound = today + Duration::weeks(i64::from(horizon_weeks));
    if let Some(until) = rule.effective_until {
        bound = bound.min(until);
    }

    (candidate <= bound).then_some(candidate)
}
