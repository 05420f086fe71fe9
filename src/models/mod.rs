pub mod availability;
pub mod booking;
pub mod slot;
pub mod time;

pub use availability::{normalize_breaks, ApplyMode, FieldError, RecurringAvailability};
pub use booking::{Booking, BookingStatus};
pub use slot::{SlotInstance, SlotStatus};
pub use time::{DayOfWeek, TimeRange};
