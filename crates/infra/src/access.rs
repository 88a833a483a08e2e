//! Generic operation wrapper.
//!
//! `AppServices::run` is the one place where an operation is authorized,
//! served from or registered in the cache, executed, invalidated and turned
//! into an [`ActionResult`] envelope. Nothing escapes it as an error.

use std::future::Future;

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use miliki_auth::{AuthzError, Principal, Session, authorize};
use miliki_core::{DomainError, FieldErrors, OrganizationId, OrganizationScoped};

use crate::catalog::{Guard, Operation, TagIds};
use crate::services::AppServices;
use crate::store::StoreError;

const INTERNAL_MESSAGE: &str = "Something went wrong. Please try again.";

/// Failure categories surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl FailureKind {
    pub fn status_code(self) -> u16 {
        match self {
            FailureKind::Validation => 400,
            FailureKind::Unauthenticated => 401,
            FailureKind::Forbidden => 403,
            FailureKind::NotFound => 404,
            FailureKind::Conflict => 409,
            FailureKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(FieldErrors),

    /// Duplicate or dependent data; `existing` is the conflicting record
    /// when it is safe to show.
    #[error("{message}")]
    Conflict {
        message: String,
        existing: Option<serde_json::Value>,
    },

    #[error("{0}")]
    Internal(String),
}

impl AccessError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            existing: None,
        }
    }

    /// Conflict that carries the record the input collided with.
    pub fn conflict_with<T: Serialize>(message: impl Into<String>, existing: &T) -> Self {
        Self::Conflict {
            message: message.into(),
            existing: serde_json::to_value(existing).ok(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AccessError::Authz(e) if e.is_unauthenticated() => FailureKind::Unauthenticated,
            AccessError::InvalidCredentials => FailureKind::Unauthenticated,
            AccessError::Authz(_) | AccessError::Forbidden(_) => FailureKind::Forbidden,
            AccessError::NotFound(_) => FailureKind::NotFound,
            AccessError::Validation(_) => FailureKind::Validation,
            AccessError::Conflict { .. } => FailureKind::Conflict,
            AccessError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Text shown to the caller. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AccessError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DomainError> for AccessError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(fields) => AccessError::Validation(fields),
            DomainError::InvalidId(msg) => {
                let mut fields = FieldErrors::new();
                fields.push("id", msg);
                AccessError::Validation(fields)
            }
            DomainError::NotFound(entity) => AccessError::NotFound(entity),
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => {
                AccessError::conflict(msg)
            }
        }
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err.user_message() {
            Some(message) => AccessError::conflict(message),
            None => AccessError::Internal(err.to_string()),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Fail with `TenantMismatch` unless `record` lives in the active
/// organization.
pub fn ensure_scope<R: OrganizationScoped>(principal: &Principal, record: &R) -> AccessResult<()> {
    ensure_active_organization(principal, record.organization_id())
}

pub fn ensure_active_organization(
    principal: &Principal,
    organization_id: OrganizationId,
) -> AccessResult<()> {
    match principal.active_organization_id {
        Some(active) if active == organization_id => Ok(()),
        Some(_) => Err(AuthzError::TenantMismatch.into()),
        None => Err(AuthzError::NoActiveOrganization.into()),
    }
}

/// The active organization, for operations that act on it implicitly.
pub fn active_organization(principal: &Principal) -> AccessResult<OrganizationId> {
    principal
        .active_organization_id
        .ok_or_else(|| AuthzError::NoActiveOrganization.into())
}

/// Successful operation output plus the ids its cache tags are rendered
/// from. The acting user and active organization are filled in already.
#[derive(Debug)]
pub struct Done<T> {
    pub data: T,
    pub ids: TagIds,
}

impl<T> Done<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            ids: TagIds::default(),
        }
    }

    pub fn tagged(data: T, ids: TagIds) -> Self {
        Self { data, ids }
    }
}

impl<T> From<T> for Done<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

/// Response envelope: `{success, message, data?, error?, errors?}`.
#[derive(Debug, Clone)]
pub struct ActionResult<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub error: Option<FailureKind>,
    pub errors: Option<FieldErrors>,
    /// Conflicting record on a failed write; serialized as `data`.
    pub existing: Option<serde_json::Value>,
}

impl<T> ActionResult<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            errors: None,
            existing: None,
        }
    }

    pub fn failure(err: AccessError) -> Self {
        let kind = err.kind();
        let message = err.public_message();
        let (errors, existing) = match err {
            AccessError::Validation(fields) => (Some(fields), None),
            AccessError::Conflict { existing, .. } => (None, existing),
            _ => (None, None),
        };
        Self {
            success: false,
            message,
            data: None,
            error: Some(kind),
            errors,
            existing,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.error.map_or(200, FailureKind::status_code)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionResult<U> {
        ActionResult {
            success: self.success,
            message: self.message,
            data: self.data.map(f),
            error: self.error,
            errors: self.errors,
            existing: self.existing,
        }
    }
}

impl<T: Serialize> Serialize for ActionResult<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ActionResult", 5)?;
        s.serialize_field("success", &self.success)?;
        s.serialize_field("message", &self.message)?;
        if let Some(data) = &self.data {
            s.serialize_field("data", data)?;
        } else if let Some(existing) = &self.existing {
            s.serialize_field("data", existing)?;
        } else {
            s.skip_field("data")?;
        }
        match &self.error {
            Some(kind) => s.serialize_field("error", kind)?,
            None => s.skip_field("error")?,
        }
        match &self.errors {
            Some(errors) => s.serialize_field("errors", errors)?,
            None => s.skip_field("errors")?,
        }
        s.end()
    }
}

impl AppServices {
    /// Run `op` for the session's principal.
    ///
    /// `target` is the organization a table-guarded operation addresses when
    /// the caller names one (e.g. by slug); records loaded by id are checked
    /// with [`ensure_scope`] inside `body`. `cache_args` makes a read
    /// cacheable: the result is stored under the operation name, principal
    /// and these arguments, tagged with the operation's read tags.
    pub async fn run<T, F, Fut>(
        &self,
        session: Option<&Session>,
        op: &'static Operation,
        target: Option<OrganizationId>,
        cache_args: Option<String>,
        body: F,
    ) -> ActionResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Principal) -> Fut,
        Fut: Future<Output = AccessResult<Done<T>>>,
    {
        let principal = session.map(Principal::from);

        if let Err(err) = self.check_guard(op, principal.as_ref(), target) {
            return self.finish(op, Err(err));
        }
        let Some(principal) = principal else {
            return self.finish(op, Err(AuthzError::Unauthenticated.into()));
        };

        let cache_key = cache_args
            .filter(|_| !op.is_write())
            .map(|args| cache_key(op, &principal, &args));
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache.get::<T>(key) {
                tracing::debug!(operation = op.name, "served from cache");
                return ActionResult::ok(op.message, hit);
            }
        }

        let defaults = TagIds {
            user: Some(principal.user_id),
            organization: principal.active_organization_id,
            ..TagIds::default()
        };
        let outcome = body(principal).await.map(|done| {
            let ids = defaults.merged(done.ids);
            if op.is_write() {
                let tags = ids.render(op.invalidates);
                let dropped = self.cache.invalidate(&tags);
                tracing::debug!(operation = op.name, ?tags, dropped, "invalidated cache tags");
            } else if let Some(key) = cache_key {
                self.cache.put(key, done.data.clone(), ids.render(op.reads));
            }
            done.data
        });
        self.finish(op, outcome)
    }

    /// Run a `Guard::Public` operation; there is no principal and nothing is
    /// cached.
    pub async fn run_public<T, Fut>(&self, op: &'static Operation, body: Fut) -> ActionResult<T>
    where
        Fut: Future<Output = AccessResult<T>>,
    {
        debug_assert_eq!(op.guard, Guard::Public);
        let outcome = body.await;
        self.finish(op, outcome)
    }

    fn check_guard(
        &self,
        op: &Operation,
        principal: Option<&Principal>,
        target: Option<OrganizationId>,
    ) -> AccessResult<()> {
        match (op.guard, op.permission()) {
            (Guard::Public, _) => Ok(()),
            (Guard::Table, Some(permission)) => {
                Ok(authorize(&self.permissions, principal, permission, target)?)
            }
            (Guard::Session, _) | (Guard::Table, None) => match principal {
                Some(_) => Ok(()),
                None => Err(AuthzError::Unauthenticated.into()),
            },
        }
    }

    fn finish<T>(&self, op: &Operation, outcome: AccessResult<T>) -> ActionResult<T> {
        match outcome {
            Ok(data) => {
                tracing::info!(operation = op.name, "operation succeeded");
                ActionResult::ok(op.message, data)
            }
            Err(err) => {
                let kind = err.kind();
                if kind == FailureKind::Internal {
                    tracing::error!(operation = op.name, error = %err, "operation failed");
                } else {
                    tracing::info!(operation = op.name, ?kind, reason = %err, "operation rejected");
                }
                ActionResult::failure(err)
            }
        }
    }
}

fn cache_key(op: &Operation, principal: &Principal, args: &str) -> String {
    let org = principal
        .active_organization_id
        .map(|o| o.to_string())
        .unwrap_or_default();
    format!("{}|{}|{}|{}", op.name, principal.user_id, org, args)
}

#[cfg(test)]
mod tests {
    use miliki_auth::{Action, Permission, Resource, Role};

    use super::*;

    #[test]
    fn failure_kinds_map_to_statuses() {
        let forbidden = AccessError::from(AuthzError::Forbidden {
            permission: Permission::new(Resource::Property, Action::Delete),
            required: Role::Manager,
            actual: Role::Member,
        });
        assert_eq!(forbidden.kind().status_code(), 403);
        assert_eq!(AccessError::from(AuthzError::Unauthenticated).kind().status_code(), 401);
        assert_eq!(AccessError::NotFound("Property").kind().status_code(), 404);
        assert_eq!(
            AccessError::from(DomainError::invariant("nope")).kind(),
            FailureKind::Conflict
        );
        assert_eq!(
            AccessError::from(StoreError::Backend("pool timed out".into())).kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn internal_details_are_not_shown() {
        let err = AccessError::from(StoreError::Backend("connection refused".into()));
        let result: ActionResult<()> = ActionResult::failure(err);
        assert_eq!(result.message, INTERNAL_MESSAGE);
        assert_eq!(result.status_code(), 500);
    }

    #[test]
    fn envelope_shape() {
        let ok = serde_json::to_value(ActionResult::ok("Done", vec![1, 2])).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "message": "Done", "data": [1, 2]}));

        let not_found: ActionResult<u8> = ActionResult::failure(AccessError::NotFound("Unit"));
        assert_eq!(
            serde_json::to_value(not_found).unwrap(),
            serde_json::json!({"success": false, "message": "Unit not found", "error": "not_found"})
        );

        let conflict: ActionResult<u8> = ActionResult::failure(AccessError::conflict_with(
            "A guest with this phone number already exists",
            &serde_json::json!({"name": "Wanjiru"}),
        ));
        let json = serde_json::to_value(conflict).unwrap();
        assert_eq!(json["error"], "conflict");
        assert_eq!(json["data"]["name"], "Wanjiru");
    }

    #[test]
    fn validation_failures_list_fields() {
        let err = AccessError::from(DomainError::validation("name", "Name is required"));
        let json = serde_json::to_value(ActionResult::<()>::failure(err)).unwrap();
        assert_eq!(json["message"], "Name is required");
        assert_eq!(json["errors"][0]["field"], "name");
    }
}
