//! Booking entity and its status state machine.
//!
//! The core's contract with the wider booking collaborator is narrow:
//! reserve capacity for a slot at a date, release it again, and keep the
//! status transitions legal. Payment, notification and review concerns
//! live outside this crate.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::api::{BookingId, SlotId, VendorId};

/// Booking lifecycle status.
///
/// `pending → confirmed → in_progress → completed`, with `cancelled`
/// reachable from every non-terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Whether the state machine allows `self -> next`.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// A customer booking holding one reservation on a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Database id, None before first insert
    pub id: Option<BookingId>,
    pub vendor_id: VendorId,
    /// Slot whose ledger this booking consumes
    pub slot_id: SlotId,
    pub scheduled_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: BookingStatus,
}

impl Booking {
    /// Whether this booking currently holds a slot reservation.
    ///
    /// Cancelled and completed bookings have released (or consumed)
    /// their capacity.
    pub fn holds_reservation(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn cancel_from_non_terminal_only() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn no_skipping_states() {
        use BookingStatus::*;
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
    }

    #[test]
    fn status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }
}
