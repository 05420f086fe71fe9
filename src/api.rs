//! Public API surface for the availability core.
//!
//! This file consolidates the identifier newtypes and the shared result
//! types returned by the service layer. All types derive
//! Serialize/Deserialize for JSON serialization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Vendor identifier (database primary key).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VendorId(pub i64);

/// Service (offering) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub i64);

/// Recurring availability rule identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

/// Materialized slot instance identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub i64);

/// Booking identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookingId(pub i64);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: i64) -> Self {
                $name(value)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_id!(VendorId);
impl_id!(ServiceId);
impl_id!(RuleId);
impl_id!(SlotId);
impl_id!(BookingId);

/// Non-fatal warning produced while materializing slots for one day.
///
/// Generation failures are isolated per day so one bad occurrence cannot
/// roll back an otherwise-successful rule mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationWarning {
    /// Calendar date the warning applies to
    pub date: NaiveDate,
    /// Human-readable reason
    pub detail: String,
}

impl GenerationWarning {
    pub fn new(date: NaiveDate, detail: impl Into<String>) -> Self {
        Self {
            date,
            detail: detail.into(),
        }
    }
}

/// Outcome of a rule creation/update including slot materialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// Rules inserted or updated by the operation
    pub rule_ids: Vec<RuleId>,
    /// Number of slot instances materialized
    pub slots_created: usize,
    /// Per-day generation warnings (non-fatal)
    pub warnings: Vec<GenerationWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_and_value() {
        let vendor = VendorId::new(7);
        assert_eq!(vendor.value(), 7);
        assert_eq!(vendor.to_string(), "7");
        assert_eq!(RuleId::new(3), RuleId(3));
    }

    #[test]
    fn generation_warning_roundtrip() {
        let w = GenerationWarning::new(
            NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
            "slot kept: live reservation",
        );
        let json = serde_json::to_string(&w).unwrap();
        let back: GenerationWarning = serde_json::from_str(&json).unwrap();
        assert_eq!(w, back);
    }
}
