use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// Roles form a total order; the derived `Ord` follows declaration order, so
/// `Role::Admin > Role::Owner > Role::Manager > Role::Member > Role::User`.
/// `User` is the implicit role of a signed-in account with no membership in
/// the active organization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Member,
    Manager,
    Owner,
    Admin,
}

impl Role {
    /// All roles, lowest rank first.
    pub const ALL: [Role; 5] = [Role::User, Role::Member, Role::Manager, Role::Owner, Role::Admin];

    pub fn rank(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Member => 1,
            Role::Manager => 2,
            Role::Owner => 3,
            Role::Admin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Member => "member",
            Role::Manager => "manager",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }

    /// Whether this role can be held as an organization membership.
    pub fn is_membership_role(self) -> bool {
        self != Role::User
    }

    pub fn at_least(self, min: Role) -> bool {
        self.rank() >= min.rank()
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::User => "Signed-in account without a role in the active organization",
            Role::Member => "Read access to organization data",
            Role::Manager => "Manages properties, units, tenancies and billing",
            Role::Owner => "Manages members, invitations and organization settings",
            Role::Admin => "Full administrative access",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "member" => Ok(Role::Member),
            "manager" => Ok(Role::Manager),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ord_matches_rank() {
        for a in Role::ALL {
            for b in Role::ALL {
                assert_eq!(a.cmp(&b), a.rank().cmp(&b.rank()));
            }
        }
    }

    #[test]
    fn hierarchy_order() {
        assert!(Role::Admin > Role::Owner);
        assert!(Role::Owner > Role::Manager);
        assert!(Role::Manager > Role::Member);
        assert!(Role::Member > Role::User);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("superuser".parse::<Role>().is_err());
    }
}
