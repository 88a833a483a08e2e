//! Persistence boundary.
//!
//! Each store trait covers one area of the data model. Every method is a
//! single atomic statement against the backend; there are no multi-statement
//! transactions. Implementations:
//!
//! - [`InMemoryStore`]: `RwLock<HashMap>` tables for development and tests
//! - [`PgStore`]: Postgres via `sqlx`

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use miliki_auth::{Role, User};
use miliki_billing::{Invoice, Payment};
use miliki_core::{
    BookingId, EmailAddress, GuestId, InvitationId, InvoiceId, OrganizationId, PaymentId,
    PropertyId, SessionId, TenancyId, UnitId, UserId,
};
use miliki_guests::{Booking, Guest};
use miliki_leasing::Tenancy;
use miliki_organizations::{Invitation, Membership, Organization};
use miliki_properties::{Property, Unit};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    /// Plain-language explanation for integrity violations; `None` for
    /// backend failures, which are not the caller's fault.
    pub fn user_message(&self) -> Option<String> {
        match self {
            StoreError::UniqueViolation { constraint } => Some(
                match constraint.as_str() {
                    "users_email_key" => "An account with this email already exists",
                    "users_username_key" => "That username is already taken",
                    "organizations_slug_key" => "An organization with this slug already exists",
                    "memberships_pkey" => "This user is already a member of the organization",
                    "units_property_unit_number_key" => {
                        "This unit number already exists in this property"
                    }
                    "guests_created_by_phone_key" => "A guest with this phone number already exists",
                    "guests_created_by_email_key" => "A guest with this email already exists",
                    _ => "This record already exists",
                }
                .to_string(),
            ),
            StoreError::ForeignKeyViolation { .. } => {
                Some("This record is linked to other records and cannot be changed".to_string())
            }
            StoreError::Backend(_) => None,
        }
    }
}

/// Persisted session row. Only the token hash is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub token_hash: String,
    pub active_organization_id: Option<OrganizationId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An organization as seen by one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationSummary {
    #[serde(flatten)]
    pub organization: Organization,
    pub role: Role,
}

/// A membership joined with the member's account details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub membership: Membership,
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &SessionRecord) -> StoreResult<()>;
    async fn find_session_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<SessionRecord>>;
    async fn set_active_organization(
        &self,
        id: SessionId,
        organization_id: Option<OrganizationId>,
    ) -> StoreResult<()>;
    async fn delete_session(&self, id: SessionId) -> StoreResult<()>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Inserts the organization together with its founding membership.
    async fn insert_organization(&self, org: &Organization, founder: &Membership) -> StoreResult<()>;
    async fn find_organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>>;
    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>>;
    async fn list_organizations_for_user(&self, user_id: UserId) -> StoreResult<Vec<OrganizationSummary>>;
    async fn update_organization(&self, org: &Organization) -> StoreResult<()>;
    async fn delete_organization(&self, id: OrganizationId) -> StoreResult<()>;

    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> StoreResult<Option<Membership>>;
    async fn list_members(&self, organization_id: OrganizationId) -> StoreResult<Vec<MemberDetail>>;
    async fn insert_membership(&self, membership: &Membership) -> StoreResult<()>;
    async fn update_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<()>;
    async fn delete_membership(&self, organization_id: OrganizationId, user_id: UserId) -> StoreResult<()>;

    async fn insert_invitation(&self, invitation: &Invitation) -> StoreResult<()>;
    async fn find_invitation(&self, id: InvitationId) -> StoreResult<Option<Invitation>>;
    async fn list_invitations(&self, organization_id: OrganizationId) -> StoreResult<Vec<Invitation>>;
    async fn update_invitation(&self, invitation: &Invitation) -> StoreResult<()>;
}

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn insert_property(&self, property: &Property) -> StoreResult<()>;
    async fn find_property(&self, id: PropertyId) -> StoreResult<Option<Property>>;
    async fn list_properties(&self, organization_id: OrganizationId) -> StoreResult<Vec<Property>>;
    async fn update_property(&self, property: &Property) -> StoreResult<()>;
    async fn delete_property(&self, id: PropertyId) -> StoreResult<()>;

    async fn insert_unit(&self, unit: &Unit) -> StoreResult<()>;
    async fn find_unit(&self, id: UnitId) -> StoreResult<Option<Unit>>;
    async fn list_units(&self, property_id: PropertyId) -> StoreResult<Vec<Unit>>;
    async fn list_units_for_organization(&self, organization_id: OrganizationId) -> StoreResult<Vec<Unit>>;
    async fn update_unit(&self, unit: &Unit) -> StoreResult<()>;
    async fn delete_unit(&self, id: UnitId) -> StoreResult<()>;
}

#[async_trait]
pub trait TenancyStore: Send + Sync {
    async fn insert_tenancy(&self, tenancy: &Tenancy) -> StoreResult<()>;
    async fn find_tenancy(&self, id: TenancyId) -> StoreResult<Option<Tenancy>>;
    async fn list_tenancies(&self, organization_id: OrganizationId) -> StoreResult<Vec<Tenancy>>;
    async fn list_tenancies_for_unit(&self, unit_id: UnitId) -> StoreResult<Vec<Tenancy>>;
    async fn update_tenancy(&self, tenancy: &Tenancy) -> StoreResult<()>;
    async fn delete_tenancy(&self, id: TenancyId) -> StoreResult<()>;
}

#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn find_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn list_invoices(&self, organization_id: OrganizationId) -> StoreResult<Vec<Invoice>>;
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()>;

    async fn insert_payment(&self, payment: &Payment) -> StoreResult<()>;
    async fn find_payment(&self, id: PaymentId) -> StoreResult<Option<Payment>>;
    async fn list_payments(&self, organization_id: OrganizationId) -> StoreResult<Vec<Payment>>;
    async fn list_payments_for_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>>;
    async fn list_payments_for_guest(&self, guest_id: GuestId) -> StoreResult<Vec<Payment>>;
    async fn update_payment(&self, payment: &Payment) -> StoreResult<()>;
    async fn delete_payment(&self, id: PaymentId) -> StoreResult<()>;
}

#[async_trait]
pub trait GuestStore: Send + Sync {
    async fn insert_guest(&self, guest: &Guest) -> StoreResult<()>;
    async fn find_guest(&self, id: GuestId) -> StoreResult<Option<Guest>>;
    async fn list_guests(&self, created_by: UserId) -> StoreResult<Vec<Guest>>;
    async fn update_guest(&self, guest: &Guest) -> StoreResult<()>;
    async fn delete_guest(&self, id: GuestId) -> StoreResult<()>;

    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()>;
    async fn find_booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;
    async fn list_bookings(&self, guest_id: GuestId) -> StoreResult<Vec<Booking>>;
    async fn list_bookings_for_unit(&self, unit_id: UnitId) -> StoreResult<Vec<Booking>>;
    async fn update_booking(&self, booking: &Booking) -> StoreResult<()>;
}

/// Every store the application needs, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub organizations: Arc<dyn OrganizationStore>,
    pub properties: Arc<dyn PropertyStore>,
    pub tenancies: Arc<dyn TenancyStore>,
    pub billing: Arc<dyn BillingStore>,
    pub guests: Arc<dyn GuestStore>,
}

impl Stores {
    /// All areas backed by one shared implementation.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore
            + SessionStore
            + OrganizationStore
            + PropertyStore
            + TenancyStore
            + BillingStore
            + GuestStore
            + 'static,
    {
        Self {
            users: backend.clone(),
            sessions: backend.clone(),
            organizations: backend.clone(),
            properties: backend.clone(),
            tenancies: backend.clone(),
            billing: backend.clone(),
            guests: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violations_have_friendly_messages() {
        let err = StoreError::unique("guests_created_by_phone_key");
        assert_eq!(
            err.user_message().as_deref(),
            Some("A guest with this phone number already exists")
        );
        assert_eq!(
            StoreError::unique("whatever").user_message().as_deref(),
            Some("This record already exists")
        );
        assert!(StoreError::Backend("down".into()).user_message().is_none());
    }
}
