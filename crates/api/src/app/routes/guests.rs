//! Guests and their bookings. Both are owned by the signed-in user.

use std::sync::Arc;

use axum::{
    Extension, Router,
    response::Response,
    routing::{get, put},
};

use miliki_core::{BookingId, GuestId};
use miliki_guests::{BookingStatus, NewBookingInput, NewGuestInput, UpdateGuestInput};
use miliki_infra::AppServices;

use crate::app::dto::{Param, Payload, StatusChange};
use crate::app::errors::respond;
use crate::context::CurrentSession;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).patch(update).delete(delete))
        .route("/:id/bookings", get(list_bookings).post(create_booking))
}

pub fn bookings_router() -> Router {
    Router::new().route("/:id/status", put(update_booking_status))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewGuestInput>,
) -> Response {
    respond(services.create_guest(ctx.session(), input).await)
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.list_guests(ctx.session()).await)
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<GuestId>,
) -> Response {
    respond(services.get_guest(ctx.session(), id).await)
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<GuestId>,
    Payload(input): Payload<UpdateGuestInput>,
) -> Response {
    respond(services.update_guest(ctx.session(), id, input).await)
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<GuestId>,
) -> Response {
    respond(services.delete_guest(ctx.session(), id).await)
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(guest_id): Param<GuestId>,
    Payload(input): Payload<NewBookingInput>,
) -> Response {
    respond(services.create_booking(ctx.session(), guest_id, input).await)
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(guest_id): Param<GuestId>,
) -> Response {
    respond(services.list_bookings(ctx.session(), guest_id).await)
}

pub async fn update_booking_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<BookingId>,
    Payload(body): Payload<StatusChange<BookingStatus>>,
) -> Response {
    respond(services.update_booking_status(ctx.session(), id, body.status).await)
}
