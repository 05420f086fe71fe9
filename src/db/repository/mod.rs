//! Repository trait definitions for database operations.
//!
//! Responsibilities are split across focused traits so implementations
//! stay testable:
//!
//! - [`error`]: Error types for repository operations
//! - [`availability`]: Recurring rule storage
//! - [`slot`]: Materialized slots and the reservation ledger
//! - [`booking`]: Minimal booking persistence
//!
//! A complete backend implements all three data traits; functions that
//! need everything take the [`FullRepository`] bound.

pub mod availability;
pub mod booking;
pub mod error;
pub mod slot;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use availability::AvailabilityRepository;
pub use booking::BookingRepository;
pub use slot::{SlotFilter, SlotRepository, TemplateCleanup};

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type implementing all three data
/// traits.
pub trait FullRepository: AvailabilityRepository + SlotRepository + BookingRepository {}

impl<T> FullRepository for T where T: AvailabilityRepository + SlotRepository + BookingRepository {}
