//! Vendor-facing slot management.

use log::info;

use crate::api::{SlotId, VendorId};
use crate::db::repository::{FullRepository, RepositoryResult, SlotFilter};
use crate::models::{SlotInstance, SlotStatus};

/// List a vendor's bookable slots.
///
/// With `filter.date` set the listing is restricted to that date's
/// weekday and each slot carries the date's reservation count.
pub async fn list_active_slots(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    filter: SlotFilter,
) -> RepositoryResult<Vec<SlotInstance>> {
    repo.list_available_slots(vendor_id, filter).await
}

/// Apply a status to a batch of slots, all-or-nothing on ownership.
///
/// Deleting slots that still hold live reservations is refused with
/// `Conflict` unless `force` is set (admin path); a forced delete
/// removes the ledger entries with the slots.
pub async fn bulk_set_slot_status(
    repo: &dyn FullRepository,
    vendor_id: VendorId,
    slot_ids: &[SlotId],
    status: SlotStatus,
    force: bool,
) -> RepositoryResult<usize> {
    if slot_ids.is_empty() {
        return Ok(0);
    }
    let affected = repo
        .bulk_set_status(vendor_id, slot_ids, status, force)
        .await?;
    info!(
        "{:?} applied to {} slot(s) for vendor {}{}",
        status,
        affected,
        vendor_id,
        if force { " (forced)" } else { "" }
    );
    Ok(affected)
}
