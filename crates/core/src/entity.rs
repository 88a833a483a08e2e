//! Entity traits: identity + ownership scope.

use crate::id::{OrganizationId, UserId};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Entities that live inside exactly one organization (tenant).
pub trait OrganizationScoped: Entity {
    fn organization_id(&self) -> OrganizationId;

    /// Whether this record belongs to `organization_id`.
    fn belongs_to(&self, organization_id: OrganizationId) -> bool {
        self.organization_id() == organization_id
    }
}

/// Entities owned by (or created by) a single user.
pub trait Owned: Entity {
    fn owner_id(&self) -> UserId;

    fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id() == user_id
    }
}
