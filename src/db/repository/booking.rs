//! Booking repository trait.
//!
//! The core only touches bookings through the reserve/release contract;
//! this trait holds the minimal persistence the reservation engine needs
//! to drive status transitions and reschedules.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::api::BookingId;
use crate::models::Booking;

/// Repository trait for bookings.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persist a new booking.
    ///
    /// # Returns
    /// * `Ok(BookingId)` - Assigned id
    async fn insert_booking(&self, booking: &Booking) -> RepositoryResult<BookingId>;

    /// Fetch a booking by id.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - Unknown id
    async fn get_booking(&self, booking_id: BookingId) -> RepositoryResult<Booking>;

    /// Replace a booking's stored fields. The booking must carry its id.
    async fn update_booking(&self, booking: &Booking) -> RepositoryResult<()>;
}
