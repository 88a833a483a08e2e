//! Declarative permission table: resource × action → minimum role.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Protected resource kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Organization,
    Member,
    Invitation,
    Property,
    Unit,
    Tenancy,
    Invoice,
    Payment,
    Guest,
    Booking,
}

impl Resource {
    pub const ALL: [Resource; 10] = [
        Resource::Organization,
        Resource::Member,
        Resource::Invitation,
        Resource::Property,
        Resource::Unit,
        Resource::Tenancy,
        Resource::Invoice,
        Resource::Payment,
        Resource::Guest,
        Resource::Booking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Organization => "organization",
            Resource::Member => "member",
            Resource::Invitation => "invitation",
            Resource::Property => "property",
            Resource::Unit => "unit",
            Resource::Tenancy => "tenancy",
            Resource::Invoice => "invoice",
            Resource::Payment => "payment",
            Resource::Guest => "guest",
            Resource::Booking => "booking",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown resource '{s}'"))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    pub fn is_mutation(self) -> bool {
        self != Action::Read
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// A (resource, action) pair, rendered as `"resource.action"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Whether the permission targets data inside a specific organization.
    ///
    /// Creating an organization and everything about guests/bookings is
    /// scoped to the acting user instead.
    pub fn is_organization_scoped(&self) -> bool {
        match self.resource {
            Resource::Guest | Resource::Booking => false,
            Resource::Organization => self.action != Action::Create,
            _ => true,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once('.')
            .ok_or_else(|| format!("permission must look like 'resource.action', got '{s}'"))?;
        Ok(Self::new(resource.parse()?, action.parse()?))
    }
}

use Role::{Manager, Member, Owner, User};

/// Minimum roles, columns ordered create/read/update/delete.
const DEFAULT_RULES: [(Resource, [Role; 4]); 10] = [
    (Resource::Organization, [User, Member, Owner, Owner]),
    (Resource::Member, [Owner, Member, Owner, Owner]),
    (Resource::Invitation, [Owner, Manager, Owner, Owner]),
    (Resource::Property, [Manager, Member, Manager, Manager]),
    (Resource::Unit, [Manager, Member, Manager, Manager]),
    (Resource::Tenancy, [Manager, Member, Manager, Owner]),
    (Resource::Invoice, [Manager, Member, Manager, Owner]),
    (Resource::Payment, [Manager, Member, Manager, Owner]),
    (Resource::Guest, [User, User, User, User]),
    (Resource::Booking, [User, User, User, User]),
];

/// One row of the table, flattened for display/audit.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionRule {
    pub permission: String,
    pub resource: Resource,
    pub action: Action,
    pub min_role: Role,
    pub organization_scoped: bool,
}

/// Resource × action → minimum role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    rules: [[Role; 4]; 10],
}

impl Default for PermissionTable {
    fn default() -> Self {
        let mut rules = [[Role::Admin; 4]; 10];
        for (resource, row) in DEFAULT_RULES {
            rules[resource.index()] = row;
        }
        Self { rules }
    }
}

impl PermissionTable {
    /// Override a single rule (builder style).
    pub fn with_rule(mut self, resource: Resource, action: Action, min_role: Role) -> Self {
        self.rules[resource.index()][action.index()] = min_role;
        self
    }

    pub fn min_role(&self, permission: Permission) -> Role {
        self.rules[permission.resource.index()][permission.action.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (Permission, Role)> + '_ {
        Resource::ALL.into_iter().flat_map(move |resource| {
            Action::ALL.into_iter().map(move |action| {
                let permission = Permission::new(resource, action);
                (permission, self.min_role(permission))
            })
        })
    }

    pub fn describe(&self) -> Vec<PermissionRule> {
        self.entries()
            .map(|(permission, min_role)| PermissionRule {
                permission: permission.to_string(),
                resource: permission.resource,
                action: permission.action,
                min_role,
                organization_scoped: permission.is_organization_scoped(),
            })
            .collect()
    }

    /// Permissions granted to `role` (rank meets each rule's minimum).
    pub fn granted_to(&self, role: Role) -> Vec<Permission> {
        self.entries()
            .filter(|(_, min)| role.at_least(*min))
            .map(|(p, _)| p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resource_has_a_rule() {
        let table = PermissionTable::default();
        assert_eq!(table.entries().count(), Resource::ALL.len() * Action::ALL.len());
        for (resource, _) in DEFAULT_RULES {
            assert!(Resource::ALL.contains(&resource));
        }
    }

    #[test]
    fn property_create_requires_manager() {
        let table = PermissionTable::default();
        assert_eq!(
            table.min_role(Permission::new(Resource::Property, Action::Create)),
            Role::Manager
        );
    }

    #[test]
    fn with_rule_overrides_only_one_cell() {
        let table = PermissionTable::default().with_rule(Resource::Unit, Action::Read, Role::Owner);
        assert_eq!(table.min_role(Permission::new(Resource::Unit, Action::Read)), Role::Owner);
        assert_eq!(table.min_role(Permission::new(Resource::Unit, Action::Create)), Role::Manager);
    }

    #[test]
    fn permission_string_round_trip() {
        let p: Permission = "tenancy.delete".parse().unwrap();
        assert_eq!(p, Permission::new(Resource::Tenancy, Action::Delete));
        assert_eq!(p.to_string(), "tenancy.delete");
        assert!("tenancy".parse::<Permission>().is_err());
        assert!("lease.read".parse::<Permission>().is_err());
    }

    #[test]
    fn scoping() {
        assert!(!Permission::new(Resource::Organization, Action::Create).is_organization_scoped());
        assert!(Permission::new(Resource::Organization, Action::Update).is_organization_scoped());
        assert!(!Permission::new(Resource::Guest, Action::Delete).is_organization_scoped());
        assert!(Permission::new(Resource::Invoice, Action::Read).is_organization_scoped());
    }
}
