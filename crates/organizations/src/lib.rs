//! Organizations domain module: tenants, memberships and invitations.
//!
//! Pure rules only (no IO, no HTTP, no storage).

pub mod invitation;
pub mod membership;
pub mod organization;

pub use invitation::{Invitation, InvitationStatus, NewInvitationInput, ValidInvitation, INVITATION_TTL_DAYS};
pub use membership::{Membership, ensure_can_grant, ensure_owner_remains};
pub use organization::{NewOrganizationInput, Organization, Slug, UpdateOrganizationInput};
