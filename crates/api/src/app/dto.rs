//! Request bodies shared across routes and the extractors that turn
//! rejections into failure envelopes.

use axum::{
    Json,
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request, rejection::JsonRejection},
    http::request::Parts,
    response::Response,
};
use serde::{Deserialize, de::DeserializeOwned};

use miliki_auth::Role;
use miliki_core::OrganizationId;

use crate::app::errors;

/// `Json<T>` whose rejection is a failure envelope instead of plain text.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                rejection.status(),
                "validation",
                rejection.body_text(),
            )),
        }
    }
}

/// `Path<T>` with the same failure envelope; a malformed id is a 400.
pub struct Param<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Param<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(errors::json_error(
                rejection.status(),
                "validation",
                rejection.body_text(),
            )),
        }
    }
}

/// `{"status": "..."}` for status transitions; `S` is the entity's status enum.
#[derive(Debug, Deserialize)]
pub struct StatusChange<S> {
    pub status: S,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ActiveOrganization {
    pub organization_id: Option<OrganizationId>,
}
