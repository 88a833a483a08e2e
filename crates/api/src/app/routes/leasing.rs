use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::Query,
    response::Response,
    routing::{get, put},
};

use miliki_core::TenancyId;
use miliki_leasing::{NewTenancyInput, TenancyStatus};
use miliki_infra::{AppServices, services::TenancyFilter};

use crate::app::dto::{Param, Payload, StatusChange};
use crate::app::errors::respond;
use crate::context::CurrentSession;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).delete(delete))
        .route("/:id/status", put(update_status))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewTenancyInput>,
) -> Response {
    respond(services.create_tenancy(ctx.session(), input).await)
}

/// GET /api/tenancies?unit_id=...
pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Query(filter): Query<TenancyFilter>,
) -> Response {
    respond(services.list_tenancies(ctx.session(), filter).await)
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<TenancyId>,
) -> Response {
    respond(services.get_tenancy(ctx.session(), id).await)
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<TenancyId>,
    Payload(body): Payload<StatusChange<TenancyStatus>>,
) -> Response {
    respond(services.update_tenancy_status(ctx.session(), id, body.status).await)
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<TenancyId>,
) -> Response {
    respond(services.delete_tenancy(ctx.session(), id).await)
}
