//! Service layer for business logic and orchestration.
//!
//! Services sit between the HTTP handlers and the repository traits:
//! they validate input, sequence repository calls, and own the
//! cross-entity invariants (supersede-on-insert, reserve-then-book,
//! reserve-before-release on reschedule).

pub mod availability;
pub mod reservation;
pub mod slot_generator;
pub mod slots;

#[cfg(test)]
mod availability_tests;
#[cfg(test)]
mod reservation_tests;

pub use availability::{
    regenerate, resolve_for_date, set_rules_status, set_schedule, update_rule, DaySchedule,
    RulePatch, RuleStatusAction, ScheduleRequest, DEFAULT_HORIZON_WEEKS,
};
pub use reservation::{
    cancel_booking, reschedule_booking, reserve, transition_booking, ReservationOutcome,
};
pub use slot_generator::generate;
pub use slots::{bulk_set_slot_status, list_active_slots};
