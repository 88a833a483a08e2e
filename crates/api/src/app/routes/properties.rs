//! Properties, their units, and portfolio stats.

use std::sync::Arc;

use axum::{
    Extension, Router,
    response::Response,
    routing::{get, post, put},
};

use miliki_core::{PropertyId, UnitId};
use miliki_properties::{NewPropertyInput, NewUnitInput, UnitStatus, UpdatePropertyInput, UpdateUnitInput};
use miliki_infra::AppServices;

use crate::app::dto::{Param, Payload, StatusChange};
use crate::app::errors::respond;
use crate::context::CurrentSession;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create))
        .route("/:id", get(get_one).patch(update).delete(delete))
        .route("/:id/units", get(list_units).post(create_unit))
}

pub fn units_router() -> Router {
    Router::new()
        .route("/:id", get(get_unit).patch(update_unit).delete(delete_unit))
        .route("/:id/status", put(update_unit_status))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewPropertyInput>,
) -> Response {
    respond(services.create_property(ctx.session(), input).await)
}

/// GET /api/organizations/:slug/properties
pub async fn list_for_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(slug): Param<String>,
) -> Response {
    respond(services.list_properties(ctx.session(), &slug).await)
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<PropertyId>,
) -> Response {
    respond(services.get_property(ctx.session(), id).await)
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<PropertyId>,
    Payload(input): Payload<UpdatePropertyInput>,
) -> Response {
    respond(services.update_property(ctx.session(), id, input).await)
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<PropertyId>,
) -> Response {
    respond(services.delete_property(ctx.session(), id).await)
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.property_stats(ctx.session()).await)
}

pub async fn create_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(property_id): Param<PropertyId>,
    Payload(input): Payload<NewUnitInput>,
) -> Response {
    respond(services.create_unit(ctx.session(), property_id, input).await)
}

pub async fn list_units(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(property_id): Param<PropertyId>,
) -> Response {
    respond(services.list_units(ctx.session(), property_id).await)
}

pub async fn get_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<UnitId>,
) -> Response {
    respond(services.get_unit(ctx.session(), id).await)
}

pub async fn update_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<UnitId>,
    Payload(input): Payload<UpdateUnitInput>,
) -> Response {
    respond(services.update_unit(ctx.session(), id, input).await)
}

pub async fn update_unit_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<UnitId>,
    Payload(body): Payload<StatusChange<UnitStatus>>,
) -> Response {
    respond(services.update_unit_status(ctx.session(), id, body.status).await)
}

pub async fn delete_unit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<UnitId>,
) -> Response {
    respond(services.delete_unit(ctx.session(), id).await)
}
