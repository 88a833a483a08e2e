use axum::{
    Router,
    routing::{get, put},
};

pub mod auth;
pub mod billing;
pub mod guests;
pub mod leasing;
pub mod organizations;
pub mod properties;
pub mod rbac;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .route("/session/active-organization", put(organizations::set_active))
        .nest("/organizations", organizations::router())
        .nest("/members", organizations::members_router())
        .nest("/invitations", organizations::invitations_router())
        .nest("/properties", properties::router())
        .nest("/units", properties::units_router())
        .route("/stats/properties", get(properties::stats))
        .nest("/tenancies", leasing::router())
        .nest("/invoices", billing::invoices_router())
        .nest("/payments", billing::payments_router())
        .nest("/guests", guests::router())
        .nest("/bookings", guests::bookings_router())
        .nest("/rbac", rbac::router())
}
