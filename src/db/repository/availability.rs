//! Recurring availability rule repository trait.
//!
//! Rules are always addressed as `(vendor, rule)` pairs: an id owned by
//! another vendor behaves exactly like a missing id.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::{RuleId, VendorId};
use crate::models::{DayOfWeek, RecurringAvailability};

/// Repository trait for recurring availability rules.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Check if the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Insert a batch of validated rules.
    ///
    /// When `supersede_ongoing` is set, any existing ongoing (open-ended)
    /// active rule for the same vendor+day is deactivated in the same
    /// transaction as the insert, so no interleaved reader can observe
    /// two active ongoing rules for one day.
    ///
    /// # Returns
    /// * `Ok(Vec<RuleId>)` - Assigned ids, one per input rule in order
    /// * `Err(RepositoryError::Conflict)` - Duplicate
    ///   `(vendor, day, effective_from, effective_until)` key
    async fn insert_rules(
        &self,
        rules: &[RecurringAvailability],
        supersede_ongoing: bool,
    ) -> RepositoryResult<Vec<RuleId>>;

    /// Fetch a single rule owned by the vendor.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - Missing id or foreign owner
    async fn get_rule(
        &self,
        vendor_id: VendorId,
        rule_id: RuleId,
    ) -> RepositoryResult<RecurringAvailability>;

    /// Replace a rule's stored fields. The rule must carry its id and
    /// belong to the vendor.
    async fn update_rule(
        &self,
        vendor_id: VendorId,
        rule: &RecurringAvailability,
    ) -> RepositoryResult<()>;

    /// List every rule (active or not) belonging to the vendor.
    async fn list_rules(&self, vendor_id: VendorId) -> RepositoryResult<Vec<RecurringAvailability>>;

    /// List ACTIVE rules for one vendor+weekday, ordered by id.
    async fn list_active_rules_for_day(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
    ) -> RepositoryResult<Vec<RecurringAvailability>>;

    /// Flip the active flag on a batch of rules.
    ///
    /// All-or-nothing: ownership of every id is verified before the
    /// first mutation; one foreign or missing id fails the whole batch
    /// with `NotFound`.
    async fn set_rules_active(
        &self,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
        active: bool,
    ) -> RepositoryResult<usize>;

    /// Hard-delete a batch of rules, with the same all-or-nothing
    /// ownership check as [`AvailabilityRepository::set_rules_active`].
    /// Materialized slots are left in place.
    async fn delete_rules(
        &self,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
    ) -> RepositoryResult<usize>;
}
