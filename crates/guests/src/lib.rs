//! Guests domain module: short-stay guests and their bookings.
//!
//! Guests belong to the user who registered them rather than to an
//! organization.

pub mod booking;
pub mod guest;

pub use booking::{Booking, BookingStatus, NewBookingInput, ValidBooking, ensure_no_overlap};
pub use guest::{
    DeletionBlockers, Guest, GuestConflict, NewGuestInput, UpdateGuestInput, ValidGuest,
    find_conflict,
};
