//! Slot instance repository trait, including the reservation ledger.
//!
//! The `(slot, date)` ledger is the single contended resource in the
//! system. `reserve` is specified as one atomic check-and-increment so
//! two racing calls for the last unit produce exactly one winner.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::RepositoryResult;
use crate::api::{SlotId, VendorId};
use crate::models::{DayOfWeek, SlotInstance, SlotStatus};

/// Filters for slot listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotFilter {
    /// Restrict to the weekday of this date and load its ledger counts
    pub date: Option<NaiveDate>,
    /// Restrict to one weekday
    pub day_of_week: Option<DayOfWeek>,
}

/// Result of clearing a rule's template slots during regeneration.
#[derive(Debug, Clone, Default)]
pub struct TemplateCleanup {
    /// Slots removed (no live reservation on any date from the cutoff on)
    pub deleted: usize,
    /// Slots kept because a live reservation references them
    pub kept: Vec<SlotId>,
}

/// Repository trait for materialized slots and their reservation ledger.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Bulk-insert generated slots.
    ///
    /// # Returns
    /// * `Ok(Vec<SlotId>)` - Assigned ids, one per input slot in order
    async fn insert_slots(&self, slots: &[SlotInstance]) -> RepositoryResult<Vec<SlotId>>;

    /// Fetch one slot owned by the vendor.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - Missing id or foreign owner
    async fn get_slot(&self, vendor_id: VendorId, slot_id: SlotId)
        -> RepositoryResult<SlotInstance>;

    /// List available slots for a vendor.
    ///
    /// When `filter.date` is set, `reservation_count` on each returned
    /// slot reflects that date's ledger; otherwise it is 0.
    async fn list_available_slots(
        &self,
        vendor_id: VendorId,
        filter: SlotFilter,
    ) -> RepositoryResult<Vec<SlotInstance>>;

    /// Find the slot matching `(vendor, weekday, start_time)`.
    ///
    /// # Returns
    /// * `Ok(None)` - No materialized slot at that time
    async fn find_slot(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
        start_time: chrono::NaiveTime,
    ) -> RepositoryResult<Option<SlotInstance>>;

    /// Apply a status to a batch of slots, all-or-nothing on ownership.
    ///
    /// Deletion of a slot with a live reservation fails with `Conflict`
    /// unless `force` is set (administrative cascade, never exposed to
    /// the vendor-facing API).
    async fn bulk_set_status(
        &self,
        vendor_id: VendorId,
        slot_ids: &[SlotId],
        status: SlotStatus,
        force: bool,
    ) -> RepositoryResult<usize>;

    /// Remove the vendor's unbooked template slots for one weekday,
    /// keeping any slot with a live reservation on `cutoff` or later.
    ///
    /// The whole weekday is cleared, not just the hours a replacement
    /// rule covers; a superseded rule's slots must never outlive it.
    async fn delete_unbooked_template_slots(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
        cutoff: NaiveDate,
    ) -> RepositoryResult<TemplateCleanup>;

    /// Atomically consume one unit of the `(slot, date)` ledger.
    ///
    /// The capacity check and the increment are a single atomic unit;
    /// read-then-write at the application layer is not an acceptable
    /// implementation.
    ///
    /// # Returns
    /// * `Ok(count)` - The ledger value after the increment
    /// * `Err(RepositoryError::CapacityExceeded)` - Ledger already full
    /// * `Err(RepositoryError::NoAvailability)` - Slot missing or marked
    ///   unavailable
    async fn reserve(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<i32>;

    /// Release one unit of the `(slot, date)` ledger, floored at zero.
    /// Releasing an empty ledger is a no-op, not an error.
    async fn release(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<()>;

    /// Current ledger value for `(slot, date)`.
    async fn reservation_count(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<i32>;
}
