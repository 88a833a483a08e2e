use serde::Serialize;
use thiserror::Error;

use miliki_core::{OrganizationId, UserId};

use crate::{Permission, PermissionTable, Role, Session};

/// A fully resolved principal for authorization decisions.
///
/// Construction of this object is decoupled from storage and transport: the
/// session resolver derives it from a session row plus the membership of the
/// active organization.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub active_organization_id: Option<OrganizationId>,
}

impl From<&Session> for Principal {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            role: session.role,
            active_organization_id: session.active_organization_id,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("You must be signed in to do that")]
    Unauthenticated,

    #[error("Select an active organization first")]
    NoActiveOrganization,

    #[error("That record belongs to a different organization")]
    TenantMismatch,

    #[error("You do not have permission to {} this {}", .permission.action, .permission.resource)]
    Forbidden {
        permission: Permission,
        required: Role,
        actual: Role,
    },
}

impl AuthzError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthzError::Unauthenticated)
    }
}

/// Rank check against the table, ignoring tenant scope.
pub fn is_allowed(table: &PermissionTable, role: Role, permission: Permission) -> bool {
    role.at_least(table.min_role(permission))
}

/// Authorize a principal for `permission`.
///
/// For organization-scoped permissions the principal must have an active
/// organization, and `target` (the organization owning the record, when
/// known) must be that organization.
///
/// - No IO
/// - No panics
pub fn authorize(
    table: &PermissionTable,
    principal: Option<&Principal>,
    permission: Permission,
    target: Option<OrganizationId>,
) -> Result<(), AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthenticated)?;

    if permission.is_organization_scoped() {
        let active = principal
            .active_organization_id
            .ok_or(AuthzError::NoActiveOrganization)?;
        if target.is_some_and(|t| t != active) {
            return Err(AuthzError::TenantMismatch);
        }
    }

    if is_allowed(table, principal.role, permission) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            permission,
            required: table.min_role(permission),
            actual: principal.role,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Unauthenticated,
    NoActiveOrganization,
    TenantMismatch,
    InsufficientRole,
}

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub permission: String,
    pub granted: bool,
    pub reason: String,
    pub role: Option<Role>,
    pub required_role: Role,
    pub active_organization_id: Option<OrganizationId>,
    pub denial: Option<DenialKind>,
    /// Roles that would satisfy the rule, lowest first.
    pub sufficient_roles: Vec<Role>,
}

/// Explain why `authorize` would allow or deny `permission`.
pub fn explain_authorization(
    table: &PermissionTable,
    principal: Option<&Principal>,
    permission: Permission,
    target: Option<OrganizationId>,
) -> AuthorizationExplanation {
    let required_role = table.min_role(permission);
    let sufficient_roles = Role::ALL
        .into_iter()
        .filter(|r| r.at_least(required_role))
        .collect();

    let decision = authorize(table, principal, permission, target);
    let (granted, reason, denial) = match &decision {
        Ok(()) => {
            let role = principal.map(|p| p.role).unwrap_or(Role::User);
            (
                true,
                format!("role '{role}' meets the minimum role '{required_role}' for '{permission}'"),
                None,
            )
        }
        Err(AuthzError::Unauthenticated) => (
            false,
            "no session was presented".to_string(),
            Some(DenialKind::Unauthenticated),
        ),
        Err(AuthzError::NoActiveOrganization) => (
            false,
            format!("'{permission}' is organization-scoped and the session has no active organization"),
            Some(DenialKind::NoActiveOrganization),
        ),
        Err(AuthzError::TenantMismatch) => (
            false,
            "the target organization differs from the session's active organization".to_string(),
            Some(DenialKind::TenantMismatch),
        ),
        Err(AuthzError::Forbidden { actual, required, .. }) => (
            false,
            format!("role '{actual}' is below the minimum role '{required}' for '{permission}'"),
            Some(DenialKind::InsufficientRole),
        ),
    };

    AuthorizationExplanation {
        permission: permission.to_string(),
        granted,
        reason,
        role: principal.map(|p| p.role),
        required_role,
        active_organization_id: principal.and_then(|p| p.active_organization_id),
        denial,
        sufficient_roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, Resource};
    use proptest::prelude::*;

    fn principal(role: Role, org: Option<OrganizationId>) -> Principal {
        Principal {
            user_id: UserId::new(),
            role,
            active_organization_id: org,
        }
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn any_permission() -> impl Strategy<Value = Permission> {
        (
            prop::sample::select(Resource::ALL.to_vec()),
            prop::sample::select(Action::ALL.to_vec()),
        )
            .prop_map(|(r, a)| Permission::new(r, a))
    }

    #[test]
    fn anonymous_is_unauthenticated() {
        let table = PermissionTable::default();
        let err = authorize(
            &table,
            None,
            Permission::new(Resource::Guest, Action::Read),
            None,
        )
        .unwrap_err();
        assert_eq!(err, AuthzError::Unauthenticated);
    }

    #[test]
    fn manager_may_create_property_in_active_org() {
        let table = PermissionTable::default();
        let org = OrganizationId::new();
        let p = principal(Role::Manager, Some(org));
        assert!(authorize(&table, Some(&p), Permission::new(Resource::Property, Action::Create), Some(org)).is_ok());
    }

    #[test]
    fn member_may_not_create_property() {
        let table = PermissionTable::default();
        let org = OrganizationId::new();
        let p = principal(Role::Member, Some(org));
        let err = authorize(&table, Some(&p), Permission::new(Resource::Property, Action::Create), Some(org))
            .unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden { required: Role::Manager, actual: Role::Member, .. }));
        assert_eq!(err.to_string(), "You do not have permission to create this property");
    }

    #[test]
    fn other_organization_is_a_tenant_mismatch_even_for_admin() {
        let table = PermissionTable::default();
        let p = principal(Role::Admin, Some(OrganizationId::new()));
        let err = authorize(
            &table,
            Some(&p),
            Permission::new(Resource::Unit, Action::Read),
            Some(OrganizationId::new()),
        )
        .unwrap_err();
        assert_eq!(err, AuthzError::TenantMismatch);
    }

    #[test]
    fn scoped_permission_needs_active_org() {
        let table = PermissionTable::default();
        let p = principal(Role::Owner, None);
        let err = authorize(&table, Some(&p), Permission::new(Resource::Invoice, Action::Read), None)
            .unwrap_err();
        assert_eq!(err, AuthzError::NoActiveOrganization);

        // Guests are user-scoped.
        assert!(authorize(&table, Some(&p), Permission::new(Resource::Guest, Action::Create), None).is_ok());
    }

    #[test]
    fn exhaustive_table_monotonicity() {
        let table = PermissionTable::default();
        for (permission, _) in table.entries() {
            for hi in Role::ALL {
                for lo in Role::ALL.into_iter().filter(|lo| *lo <= hi) {
                    if is_allowed(&table, lo, permission) {
                        assert!(is_allowed(&table, hi, permission), "{hi} denied {permission} but {lo} allowed");
                    }
                }
            }
        }
    }

    #[test]
    fn explanation_lists_sufficient_roles() {
        let table = PermissionTable::default();
        let org = OrganizationId::new();
        let p = principal(Role::Member, Some(org));
        let e = explain_authorization(&table, Some(&p), Permission::new(Resource::Tenancy, Action::Delete), None);
        assert!(!e.granted);
        assert_eq!(e.denial, Some(DenialKind::InsufficientRole));
        assert_eq!(e.required_role, Role::Owner);
        assert_eq!(e.sufficient_roles, vec![Role::Owner, Role::Admin]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        #[test]
        fn permission_is_monotonic_in_role(a in any_role(), b in any_role(), permission in any_permission()) {
            let table = PermissionTable::default();
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(is_allowed(&table, hi, permission) >= is_allowed(&table, lo, permission));
        }

        #[test]
        fn monotonic_for_arbitrary_tables(
            overrides in prop::collection::vec((any_permission(), any_role()), 0..12),
            a in any_role(),
            b in any_role(),
            permission in any_permission(),
        ) {
            let table = overrides.into_iter().fold(PermissionTable::default(), |t, (p, r)| {
                t.with_rule(p.resource, p.action, r)
            });
            let org = OrganizationId::new();
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            let allowed = |role| authorize(&table, Some(&principal(role, Some(org))), permission, Some(org)).is_ok();
            prop_assert!(allowed(hi) >= allowed(lo));
        }
    }
}
