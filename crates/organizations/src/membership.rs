use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use miliki_auth::Role;
use miliki_core::{DomainError, DomainResult, OrganizationId, UserId};

/// A user's role inside one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Actors cannot hand out a role above their own, and `user` is not a
/// membership role.
pub fn ensure_can_grant(actor: Role, granted: Role) -> DomainResult<()> {
    if !granted.is_membership_role() {
        return Err(DomainError::validation(
            "role",
            "Role must be one of: member, manager, owner, admin",
        ));
    }
    if granted > actor {
        return Err(DomainError::invariant(format!(
            "You cannot grant the '{granted}' role because it is above your own role"
        )));
    }
    Ok(())
}

/// Guard against leaving an organization without an owner.
///
/// `new_role == None` means the member is being removed.
pub fn ensure_owner_remains(
    members: &[Membership],
    target: UserId,
    new_role: Option<Role>,
) -> DomainResult<()> {
    let Some(current) = members.iter().find(|m| m.user_id == target) else {
        return Err(DomainError::not_found("Member"));
    };
    if current.role != Role::Owner || new_role == Some(Role::Owner) {
        return Ok(());
    }
    let owners = members.iter().filter(|m| m.role == Role::Owner).count();
    if owners <= 1 {
        return Err(DomainError::conflict(
            "An organization must keep at least one owner",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(org: OrganizationId, role: Role) -> Membership {
        Membership {
            organization_id: org,
            user_id: UserId::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sole_owner_cannot_be_demoted_or_removed() {
        let org = OrganizationId::new();
        let owner = member(org, Role::Owner);
        let members = vec![owner.clone(), member(org, Role::Manager)];

        let err = ensure_owner_remains(&members, owner.user_id, Some(Role::Manager)).unwrap_err();
        assert_eq!(err.to_string(), "An organization must keep at least one owner");
        assert!(ensure_owner_remains(&members, owner.user_id, None).is_err());
    }

    #[test]
    fn second_owner_can_leave() {
        let org = OrganizationId::new();
        let a = member(org, Role::Owner);
        let b = member(org, Role::Owner);
        let members = vec![a.clone(), b];
        assert!(ensure_owner_remains(&members, a.user_id, None).is_ok());
    }

    #[test]
    fn cannot_grant_above_own_role() {
        assert!(ensure_can_grant(Role::Owner, Role::Admin).is_err());
        assert!(ensure_can_grant(Role::Owner, Role::Owner).is_ok());
        assert!(ensure_can_grant(Role::Admin, Role::User).is_err());
    }
}
