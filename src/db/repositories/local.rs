//! In-memory local repository implementation.
//!
//! Implements all repository traits on top of HashMaps guarded by a
//! single `parking_lot::RwLock`, giving fast, deterministic and isolated
//! execution for unit tests and local development. Holding the write
//! guard across check-and-increment makes `reserve` the atomic unit the
//! contract requires.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{BookingId, RuleId, SlotId, VendorId};
use crate::db::repository::*;
use crate::models::{Booking, DayOfWeek, RecurringAvailability, SlotInstance, SlotStatus};

/// In-memory local repository.
///
/// # Example
/// ```
/// use slotwise::db::repositories::LocalRepository;
///
/// let repo = LocalRepository::new();
/// assert_eq!(repo.rule_count(), 0);
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    rules: HashMap<RuleId, RecurringAvailability>,
    slots: HashMap<SlotId, SlotInstance>,
    // Reservation ledger, keyed by (slot, date)
    ledger: HashMap<(SlotId, NaiveDate), i32>,
    bookings: HashMap<BookingId, Booking>,

    // ID counters
    next_rule_id: i64,
    next_slot_id: i64,
    next_booking_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            slots: HashMap::new(),
            ledger: HashMap::new(),
            bookings: HashMap::new(),
            next_rule_id: 1,
            next_slot_id: 1,
            next_booking_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        let healthy = data.is_healthy;
        *data = LocalData {
            is_healthy: healthy,
            ..Default::default()
        };
    }

    /// Number of stored rules.
    pub fn rule_count(&self) -> usize {
        self.data.read().rules.len()
    }

    /// Number of stored slots.
    pub fn slot_count(&self) -> usize {
        self.data.read().slots.len()
    }

    fn check_health(data: &LocalData) -> RepositoryResult<()> {
        if !data.is_healthy {
            return Err(RepositoryError::connection("repository is not healthy"));
        }
        Ok(())
    }

    /// Verify every id exists and belongs to the vendor before any
    /// mutation. Ownership mismatch reports as not-found.
    fn check_rule_ownership(
        data: &LocalData,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
    ) -> RepositoryResult<()> {
        for id in rule_ids {
            match data.rules.get(id) {
                Some(rule) if rule.vendor_id == vendor_id => {}
                _ => {
                    return Err(RepositoryError::not_found_with_context(
                        format!("rule {} not found for vendor {}", id, vendor_id),
                        ErrorContext::default().with_entity("rule").with_entity_id(id),
                    ))
                }
            }
        }
        Ok(())
    }

    fn check_slot_ownership(
        data: &LocalData,
        vendor_id: VendorId,
        slot_ids: &[SlotId],
    ) -> RepositoryResult<()> {
        for id in slot_ids {
            match data.slots.get(id) {
                Some(slot) if slot.vendor_id == vendor_id => {}
                _ => {
                    return Err(RepositoryError::not_found_with_context(
                        format!("slot {} not found for vendor {}", id, vendor_id),
                        ErrorContext::default().with_entity("slot").with_entity_id(id),
                    ))
                }
            }
        }
        Ok(())
    }

    fn live_reservation_exists(data: &LocalData, slot_id: SlotId, cutoff: Option<NaiveDate>) -> bool {
        data.ledger.iter().any(|(&(sid, date), &count)| {
            sid == slot_id && count > 0 && cutoff.map_or(true, |c| date >= c)
        })
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvailabilityRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn insert_rules(
        &self,
        rules: &[RecurringAvailability],
        supersede_ongoing: bool,
    ) -> RepositoryResult<Vec<RuleId>> {
        let mut data = self.data.write();
        Self::check_health(&data)?;

        // Uniqueness on (vendor, day, effective_from, effective_until)
        // among ACTIVE rules, checked against the store and within the
        // batch itself. Rules this batch is about to supersede are
        // excluded so an ongoing resubmission never conflicts with the
        // history row it replaces.
        let will_supersede = |r: &RecurringAvailability| {
            supersede_ongoing
                && r.is_ongoing()
                && rules.iter().any(|n| {
                    n.is_ongoing() && n.vendor_id == r.vendor_id && n.day_of_week == r.day_of_week
                })
        };
        let mut seen: Vec<(VendorId, DayOfWeek, Option<NaiveDate>, Option<NaiveDate>)> = data
            .rules
            .values()
            .filter(|r| r.is_active && !will_supersede(r))
            .map(|r| (r.vendor_id, r.day_of_week, r.effective_from, r.effective_until))
            .collect();
        for rule in rules {
            let key = (
                rule.vendor_id,
                rule.day_of_week,
                rule.effective_from,
                rule.effective_until,
            );
            if seen.contains(&key) {
                return Err(RepositoryError::conflict_with_context(
                    format!(
                        "rule for vendor {} on {} with the same effective window already exists",
                        rule.vendor_id, rule.day_of_week
                    ),
                    ErrorContext::new("insert_rules").with_entity("rule"),
                ));
            }
            seen.push(key);
        }

        if supersede_ongoing {
            for rule in rules.iter().filter(|r| r.is_ongoing()) {
                let (vendor, day) = (rule.vendor_id, rule.day_of_week);
                for existing in data.rules.values_mut() {
                    if existing.vendor_id == vendor
                        && existing.day_of_week == day
                        && existing.is_active
                        && existing.is_ongoing()
                    {
                        existing.is_active = false;
                    }
                }
            }
        }

        let mut ids = Vec::with_capacity(rules.len());
        for rule in rules {
            let id = RuleId(data.next_rule_id);
            data.next_rule_id += 1;
            let mut stored = rule.clone();
            stored.id = Some(id);
            data.rules.insert(id, stored);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_rule(
        &self,
        vendor_id: VendorId,
        rule_id: RuleId,
    ) -> RepositoryResult<RecurringAvailability> {
        let data = self.data.read();
        data.rules
            .get(&rule_id)
            .filter(|r| r.vendor_id == vendor_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::not_found(format!(
                    "rule {} not found for vendor {}",
                    rule_id, vendor_id
                ))
            })
    }

    async fn update_rule(
        &self,
        vendor_id: VendorId,
        rule: &RecurringAvailability,
    ) -> RepositoryResult<()> {
        let rule_id = rule.id.ok_or_else(|| {
            RepositoryError::validation("cannot update a rule without an id")
        })?;

        let mut data = self.data.write();
        match data.rules.get_mut(&rule_id) {
            Some(existing) if existing.vendor_id == vendor_id => {
                *existing = rule.clone();
                Ok(())
            }
            _ => Err(RepositoryError::not_found(format!(
                "rule {} not found for vendor {}",
                rule_id, vendor_id
            ))),
        }
    }

    async fn list_rules(&self, vendor_id: VendorId) -> RepositoryResult<Vec<RecurringAvailability>> {
        let data = self.data.read();
        let mut rules: Vec<_> = data
            .rules
            .values()
            .filter(|r| r.vendor_id == vendor_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn list_active_rules_for_day(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
    ) -> RepositoryResult<Vec<RecurringAvailability>> {
        let data = self.data.read();
        let mut rules: Vec<_> = data
            .rules
            .values()
            .filter(|r| r.vendor_id == vendor_id && r.day_of_week == day && r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn set_rules_active(
        &self,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
        active: bool,
    ) -> RepositoryResult<usize> {
        let mut data = self.data.write();
        Self::check_rule_ownership(&data, vendor_id, rule_ids)?;

        for id in rule_ids {
            if let Some(rule) = data.rules.get_mut(id) {
                rule.is_active = active;
            }
        }
        Ok(rule_ids.len())
    }

    async fn delete_rules(
        &self,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
    ) -> RepositoryResult<usize> {
        let mut data = self.data.write();
        Self::check_rule_ownership(&data, vendor_id, rule_ids)?;

        for id in rule_ids {
            data.rules.remove(id);
        }
        Ok(rule_ids.len())
    }
}

// ==================== Slot Repository ====================

#[async_trait]
impl SlotRepository for LocalRepository {
    async fn insert_slots(&self, slots: &[SlotInstance]) -> RepositoryResult<Vec<SlotId>> {
        let mut data = self.data.write();
        Self::check_health(&data)?;

        let mut ids = Vec::with_capacity(slots.len());
        for slot in slots {
            let id = SlotId(data.next_slot_id);
            data.next_slot_id += 1;
            let mut stored = slot.clone();
            stored.id = Some(id);
            stored.reservation_count = 0;
            data.slots.insert(id, stored);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_slot(
        &self,
        vendor_id: VendorId,
        slot_id: SlotId,
    ) -> RepositoryResult<SlotInstance> {
        let data = self.data.read();
        data.slots
            .get(&slot_id)
            .filter(|s| s.vendor_id == vendor_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::not_found(format!(
                    "slot {} not found for vendor {}",
                    slot_id, vendor_id
                ))
            })
    }

    async fn list_available_slots(
        &self,
        vendor_id: VendorId,
        filter: SlotFilter,
    ) -> RepositoryResult<Vec<SlotInstance>> {
        let data = self.data.read();

        let day = filter
            .day_of_week
            .or_else(|| filter.date.map(DayOfWeek::of_date));

        let mut slots: Vec<SlotInstance> = data
            .slots
            .values()
            .filter(|s| s.vendor_id == vendor_id && s.is_available)
            .filter(|s| day.map_or(true, |d| s.day_of_week == d))
            .cloned()
            .collect();

        if let Some(date) = filter.date {
            for slot in &mut slots {
                if let Some(id) = slot.id {
                    slot.reservation_count = data.ledger.get(&(id, date)).copied().unwrap_or(0);
                }
            }
        }

        slots.sort_by_key(|s| (s.day_of_week, s.start_time, s.id));
        Ok(slots)
    }

    async fn find_slot(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
        start_time: chrono::NaiveTime,
    ) -> RepositoryResult<Option<SlotInstance>> {
        let data = self.data.read();
        let mut matches: Vec<&SlotInstance> = data
            .slots
            .values()
            .filter(|s| {
                s.vendor_id == vendor_id && s.day_of_week == day && s.start_time == start_time
            })
            .collect();
        matches.sort_by_key(|s| s.id);
        Ok(matches.first().map(|s| (*s).clone()))
    }

    async fn bulk_set_status(
        &self,
        vendor_id: VendorId,
        slot_ids: &[SlotId],
        status: SlotStatus,
        force: bool,
    ) -> RepositoryResult<usize> {
        let mut data = self.data.write();
        Self::check_slot_ownership(&data, vendor_id, slot_ids)?;

        if status == SlotStatus::Deleted && !force {
            for id in slot_ids {
                if Self::live_reservation_exists(&data, *id, None) {
                    return Err(RepositoryError::conflict_with_context(
                        format!("slot {} has live reservations and cannot be deleted", id),
                        ErrorContext::new("bulk_set_status")
                            .with_entity("slot")
                            .with_entity_id(id),
                    ));
                }
            }
        }

        for id in slot_ids {
            match status {
                SlotStatus::Active => {
                    if let Some(slot) = data.slots.get_mut(id) {
                        slot.is_available = true;
                    }
                }
                SlotStatus::Inactive => {
                    if let Some(slot) = data.slots.get_mut(id) {
                        slot.is_available = false;
                    }
                }
                SlotStatus::Deleted => {
                    data.slots.remove(id);
                    data.ledger.retain(|(sid, _), _| sid != id);
                }
            }
        }
        Ok(slot_ids.len())
    }

    async fn delete_unbooked_template_slots(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
        cutoff: NaiveDate,
    ) -> RepositoryResult<TemplateCleanup> {
        let mut data = self.data.write();

        let candidates: Vec<SlotId> = data
            .slots
            .values()
            .filter(|s| s.vendor_id == vendor_id && s.day_of_week == day)
            .filter_map(|s| s.id)
            .collect();

        let mut cleanup = TemplateCleanup::default();
        for id in candidates {
            if Self::live_reservation_exists(&data, id, Some(cutoff)) {
                cleanup.kept.push(id);
            } else {
                data.slots.remove(&id);
                data.ledger.retain(|(sid, _), _| *sid != id);
                cleanup.deleted += 1;
            }
        }
        cleanup.kept.sort();
        Ok(cleanup)
    }

    async fn reserve(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<i32> {
        // Single write guard: the capacity check and the increment are
        // one atomic unit.
        let mut data = self.data.write();
        Self::check_health(&data)?;

        let max_bookings = match data.slots.get(&slot_id) {
            Some(slot) if slot.is_available => slot.max_bookings,
            Some(_) => {
                return Err(RepositoryError::no_availability(format!(
                    "slot {} is not open for booking",
                    slot_id
                )))
            }
            None => {
                return Err(RepositoryError::no_availability(format!(
                    "slot {} does not exist",
                    slot_id
                )))
            }
        };

        let count = data.ledger.entry((slot_id, date)).or_insert(0);
        if *count >= max_bookings {
            return Err(RepositoryError::capacity_exceeded_with_context(
                format!(
                    "slot {} is fully booked on {} ({}/{})",
                    slot_id, date, count, max_bookings
                ),
                ErrorContext::new("reserve")
                    .with_entity("slot")
                    .with_entity_id(slot_id),
            ));
        }
        *count += 1;
        Ok(*count)
    }

    async fn release(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<()> {
        let mut data = self.data.write();
        if let Some(count) = data.ledger.get_mut(&(slot_id, date)) {
            if *count > 0 {
                *count -= 1;
            }
        }
        // Releasing an unknown or empty ledger entry is a no-op.
        Ok(())
    }

    async fn reservation_count(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<i32> {
        Ok(self
            .data
            .read()
            .ledger
            .get(&(slot_id, date))
            .copied()
            .unwrap_or(0))
    }
}

// ==================== Booking Repository ====================

#[async_trait]
impl BookingRepository for LocalRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepositoryResult<BookingId> {
        let mut data = self.data.write();
        Self::check_health(&data)?;

        let id = BookingId(data.next_booking_id);
        data.next_booking_id += 1;
        let mut stored = booking.clone();
        stored.id = Some(id);
        data.bookings.insert(id, stored);
        Ok(id)
    }

    async fn get_booking(&self, booking_id: BookingId) -> RepositoryResult<Booking> {
        let data = self.data.read();
        data.bookings.get(&booking_id).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("booking {} not found", booking_id))
        })
    }

    async fn update_booking(&self, booking: &Booking) -> RepositoryResult<()> {
        let booking_id = booking.id.ok_or_else(|| {
            RepositoryError::validation("cannot update a booking without an id")
        })?;

        let mut data = self.data.write();
        match data.bookings.get_mut(&booking_id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(RepositoryError::not_found(format!(
                "booking {} not found",
                booking_id
            ))),
        }
    }
}
