//! Organizations, memberships and invitations.

use std::sync::Arc;

use axum::{
    Extension, Router,
    response::Response,
    routing::{get, patch, post},
};

use miliki_core::{InvitationId, OrganizationId, UserId};
use miliki_organizations::{NewInvitationInput, NewOrganizationInput, UpdateOrganizationInput};
use miliki_infra::AppServices;

use crate::app::dto::{ActiveOrganization, Param, Payload, RoleChange};
use crate::app::errors::respond;
use crate::app::routes::properties;
use crate::context::CurrentSession;

/// `/:org` is a slug for reads and an id for writes.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_mine).post(create))
        .route("/:org", get(get_by_slug).patch(update).delete(delete))
        .route("/:org/properties", get(properties::list_for_organization))
}

pub fn members_router() -> Router {
    Router::new()
        .route("/", get(list_members))
        .route("/:user_id", patch(update_member_role).delete(remove_member))
}

pub fn invitations_router() -> Router {
    Router::new()
        .route("/", get(list_invitations).post(create_invitation))
        .route("/:id/cancel", post(cancel_invitation))
        .route("/:id/accept", post(accept_invitation))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewOrganizationInput>,
) -> Response {
    respond(services.create_organization(ctx.session(), input).await)
}

pub async fn list_mine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.list_my_organizations(ctx.session()).await)
}

pub async fn get_by_slug(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(slug): Param<String>,
) -> Response {
    respond(services.get_organization(ctx.session(), &slug).await)
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<OrganizationId>,
    Payload(input): Payload<UpdateOrganizationInput>,
) -> Response {
    respond(services.update_organization(ctx.session(), id, input).await)
}

pub async fn delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<OrganizationId>,
) -> Response {
    respond(services.delete_organization(ctx.session(), id).await)
}

/// PUT /api/session/active-organization
pub async fn set_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(body): Payload<ActiveOrganization>,
) -> Response {
    respond(services.set_active_organization(ctx.session(), body.organization_id).await)
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.list_members(ctx.session()).await)
}

pub async fn update_member_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(user_id): Param<UserId>,
    Payload(body): Payload<RoleChange>,
) -> Response {
    respond(services.update_member_role(ctx.session(), user_id, body.role).await)
}

pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(user_id): Param<UserId>,
) -> Response {
    respond(services.remove_member(ctx.session(), user_id).await)
}

pub async fn create_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewInvitationInput>,
) -> Response {
    respond(services.create_invitation(ctx.session(), input).await)
}

pub async fn list_invitations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.list_invitations(ctx.session()).await)
}

pub async fn cancel_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<InvitationId>,
) -> Response {
    respond(services.cancel_invitation(ctx.session(), id).await)
}

pub async fn accept_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<InvitationId>,
) -> Response {
    respond(services.accept_invitation(ctx.session(), id).await)
}
