//! Authorization audit endpoints: the permission table, role summaries, and
//! "why was this denied?" explanations.

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::Query,
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::{Deserialize, Serialize};

use miliki_auth::{Permission, Principal, Role, explain_authorization};
use miliki_infra::{ActionResult, AppServices};

use crate::app::errors::{json_error, respond};
use crate::context::CurrentSession;

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
    /// Explain for this role instead of the caller's effective role.
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct RoleSummary {
    pub role: Role,
    pub description: &'static str,
    pub permissions: Vec<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/table", get(permission_table))
        .route("/roles", get(list_roles))
        .route("/explain", get(explain))
}

/// GET /api/rbac/table - every resource/action pair with its minimum role
pub async fn permission_table(Extension(services): Extension<Arc<AppServices>>) -> Response {
    respond(ActionResult::ok("Permission table", services.permissions.describe()))
}

/// GET /api/rbac/roles - roles lowest first, with what each is granted
pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let roles: Vec<RoleSummary> = Role::ALL
        .into_iter()
        .map(|role| RoleSummary {
            role,
            description: role.description(),
            permissions: services
                .permissions
                .granted_to(role)
                .into_iter()
                .map(|p| p.to_string())
                .collect(),
        })
        .collect();
    respond(ActionResult::ok("Roles", roles))
}

/// GET /api/rbac/explain?permission=property.delete[&role=member]
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Query(query): Query<ExplainQuery>,
) -> Response {
    let permission: Permission = match query.permission.parse() {
        Ok(p) => p,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, "validation", msg),
    };

    let principal = ctx.session().map(|session| {
        let mut principal = Principal::from(session);
        if let Some(role) = query.role {
            principal.role = role;
        }
        principal
    });

    let explanation = explain_authorization(&services.permissions, principal.as_ref(), permission, None);
    respond(ActionResult::ok(explanation.reason.clone(), explanation))
}
