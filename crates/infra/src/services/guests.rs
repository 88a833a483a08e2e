//! Guests and bookings. These belong to the user who created them rather
//! than to an organization; records of other users read as not found.

use chrono::Utc;

use miliki_auth::Session;
use miliki_billing::PaymentStatus;
use miliki_core::{BookingId, DomainError, GuestId, Owned, UserId};
use miliki_guests::{
    Booking, BookingStatus, DeletionBlockers, Guest, NewBookingInput, NewGuestInput,
    UpdateGuestInput, ensure_no_overlap, find_conflict,
};
use miliki_properties::UnitStatus;

use crate::access::{AccessError, AccessResult, ActionResult, Done, ensure_scope};
use crate::catalog::{
    CREATE_BOOKING, CREATE_GUEST, DELETE_GUEST, GET_GUEST, LIST_BOOKINGS, LIST_GUESTS, TagIds,
    UPDATE_BOOKING_STATUS, UPDATE_GUEST,
};
use crate::services::AppServices;

impl AppServices {
    /// A duplicate phone or email fails with the existing guest as data.
    pub async fn create_guest(&self, session: Option<&Session>, input: NewGuestInput) -> ActionResult<Guest> {
        self.run(session, &CREATE_GUEST, None, None, |p| async move {
            let valid = input.validate()?;
            let existing = self.stores.guests.list_guests(p.user_id).await?;
            if let Some((conflict, guest)) = find_conflict(&existing, &valid, None) {
                return Err(AccessError::conflict_with(conflict.message(), guest));
            }
            let guest = Guest::register(p.user_id, valid, Utc::now());
            self.stores.guests.insert_guest(&guest).await?;
            Ok(Done::new(guest))
        })
        .await
    }

    pub async fn list_guests(&self, session: Option<&Session>) -> ActionResult<Vec<Guest>> {
        self.run(session, &LIST_GUESTS, None, Some(String::new()), |p| async move {
            Ok(Done::new(self.stores.guests.list_guests(p.user_id).await?))
        })
        .await
    }

    pub async fn get_guest(&self, session: Option<&Session>, id: GuestId) -> ActionResult<Guest> {
        self.run(session, &GET_GUEST, None, Some(id.to_string()), |p| async move {
            Ok(Done::new(self.own_guest(id, p.user_id).await?))
        })
        .await
    }

    pub async fn update_guest(
        &self,
        session: Option<&Session>,
        id: GuestId,
        input: UpdateGuestInput,
    ) -> ActionResult<Guest> {
        self.run(session, &UPDATE_GUEST, None, None, |p| async move {
            let mut guest = self.own_guest(id, p.user_id).await?;
            let valid = guest.merged(input).validate()?;
            let existing = self.stores.guests.list_guests(p.user_id).await?;
            if let Some((conflict, other)) = find_conflict(&existing, &valid, Some(id)) {
                return Err(AccessError::conflict_with(conflict.message(), other));
            }
            guest.apply(valid, Utc::now());
            self.stores.guests.update_guest(&guest).await?;
            Ok(Done::new(guest))
        })
        .await
    }

    /// Blocked by PENDING, CONFIRMED or CHECKED_IN bookings and by PENDING
    /// payments; the failure names each.
    pub async fn delete_guest(&self, session: Option<&Session>, id: GuestId) -> ActionResult<()> {
        self.run(session, &DELETE_GUEST, None, None, |p| async move {
            self.own_guest(id, p.user_id).await?;
            let bookings = self.stores.guests.list_bookings(id).await?;
            let pending_payments = self
                .stores
                .billing
                .list_payments_for_guest(id)
                .await?
                .iter()
                .filter(|pay| pay.status == PaymentStatus::Pending)
                .count();
            DeletionBlockers::tally(&bookings, pending_payments).ensure_clear()?;
            self.stores.guests.delete_guest(id).await?;
            Ok(Done::tagged((), TagIds::default().guest(id)))
        })
        .await
    }

    /// A booked unit must sit in the active organization, be out of
    /// maintenance and be free on the requested nights.
    pub async fn create_booking(
        &self,
        session: Option<&Session>,
        guest_id: GuestId,
        input: NewBookingInput,
    ) -> ActionResult<Booking> {
        self.run(session, &CREATE_BOOKING, None, None, |p| async move {
            self.own_guest(guest_id, p.user_id).await?;
            let valid = input.validate()?;
            if let Some(unit_id) = valid.unit_id {
                let unit = self.unit(unit_id).await?;
                ensure_scope(&p, &unit)?;
                if unit.status == UnitStatus::Maintenance {
                    return Err(DomainError::invariant(
                        "This unit is under maintenance and cannot be booked",
                    )
                    .into());
                }
                let existing = self.stores.guests.list_bookings_for_unit(unit_id).await?;
                ensure_no_overlap(&existing, unit_id, valid.check_in, valid.check_out)?;
            }
            let booking = Booking::create(guest_id, p.user_id, valid, Utc::now());
            self.stores.guests.insert_booking(&booking).await?;
            Ok(Done::tagged(booking, TagIds::default().guest(guest_id)))
        })
        .await
    }

    pub async fn list_bookings(&self, session: Option<&Session>, guest_id: GuestId) -> ActionResult<Vec<Booking>> {
        self.run(session, &LIST_BOOKINGS, None, Some(guest_id.to_string()), |p| async move {
            self.own_guest(guest_id, p.user_id).await?;
            let bookings = self.stores.guests.list_bookings(guest_id).await?;
            Ok(Done::tagged(bookings, TagIds::default().guest(guest_id)))
        })
        .await
    }

    pub async fn update_booking_status(
        &self,
        session: Option<&Session>,
        id: BookingId,
        status: BookingStatus,
    ) -> ActionResult<Booking> {
        self.run(session, &UPDATE_BOOKING_STATUS, None, None, |p| async move {
            let mut booking = self
                .stores
                .guests
                .find_booking(id)
                .await?
                .filter(|b| b.is_owned_by(p.user_id))
                .ok_or(AccessError::NotFound("Booking"))?;
            booking.transition(status, Utc::now())?;
            self.stores.guests.update_booking(&booking).await?;
            let ids = TagIds::default().guest(booking.guest_id);
            Ok(Done::tagged(booking, ids))
        })
        .await
    }

    async fn own_guest(&self, id: GuestId, user_id: UserId) -> AccessResult<Guest> {
        self.stores
            .guests
            .find_guest(id)
            .await?
            .filter(|g| g.is_owned_by(user_id))
            .ok_or(AccessError::NotFound("Guest"))
    }
}
