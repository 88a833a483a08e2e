//! `miliki-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{Entity, OrganizationScoped, Owned};
pub use error::{DomainError, DomainResult, FieldError, FieldErrors};
pub use id::{
    BookingId, GuestId, InvitationId, InvoiceId, OrganizationId, PaymentId, PropertyId, SessionId,
    TenancyId, UnitId, UserId,
};
pub use value_object::{EmailAddress, PhoneNumber, ValueObject};
