use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

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

use super::{
    BillingStore, GuestStore, MemberDetail, OrganizationStore, OrganizationSummary, PropertyStore,
    SessionRecord, SessionStore, StoreError, StoreResult, TenancyStore, UserStore,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionId, SessionRecord>,
    organizations: HashMap<OrganizationId, Organization>,
    memberships: HashMap<(OrganizationId, UserId), Membership>,
    invitations: HashMap<InvitationId, Invitation>,
    properties: HashMap<PropertyId, Property>,
    units: HashMap<UnitId, Unit>,
    tenancies: HashMap<TenancyId, Tenancy>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
    guests: HashMap<GuestId, Guest>,
    bookings: HashMap<BookingId, Booking>,
}

/// In-memory implementation of every store for tests/dev.
///
/// Mirrors the uniqueness and foreign-key behaviour of the Postgres schema
/// (same constraint names) so callers see the same errors from both.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn fk(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

/// Newest first, like the Postgres `ORDER BY created_at DESC`.
fn newest_first<T: Clone>(items: impl Iterator<Item = T>, created: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    let mut v: Vec<T> = items.collect();
    v.sort_by_key(|t| std::cmp::Reverse(created(t)));
    v
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.write();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::unique("users_email_key"));
        }
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::unique("users_username_key"));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>> {
        Ok(self.read().users.values().find(|u| &u.email == email).cloned())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert_session(&self, session: &SessionRecord) -> StoreResult<()> {
        let mut t = self.write();
        if !t.users.contains_key(&session.user_id) {
            return Err(fk("sessions_user_id_fkey"));
        }
        t.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self
            .read()
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn set_active_organization(
        &self,
        id: SessionId,
        organization_id: Option<OrganizationId>,
    ) -> StoreResult<()> {
        if let Some(s) = self.write().sessions.get_mut(&id) {
            s.active_organization_id = organization_id;
        }
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> StoreResult<()> {
        self.write().sessions.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn insert_organization(&self, org: &Organization, founder: &Membership) -> StoreResult<()> {
        let mut t = self.write();
        if t.organizations.values().any(|o| o.slug == org.slug) {
            return Err(StoreError::unique("organizations_slug_key"));
        }
        t.organizations.insert(org.id, org.clone());
        t.memberships
            .insert((founder.organization_id, founder.user_id), founder.clone());
        Ok(())
    }

    async fn find_organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>> {
        Ok(self.read().organizations.get(&id).cloned())
    }

    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>> {
        Ok(self
            .read()
            .organizations
            .values()
            .find(|o| o.slug.as_str() == slug)
            .cloned())
    }

    async fn list_organizations_for_user(&self, user_id: UserId) -> StoreResult<Vec<OrganizationSummary>> {
        let t = self.read();
        let mut out: Vec<OrganizationSummary> = t
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                t.organizations.get(&m.organization_id).map(|o| OrganizationSummary {
                    organization: o.clone(),
                    role: m.role,
                })
            })
            .collect();
        out.sort_by(|a, b| a.organization.name.cmp(&b.organization.name));
        Ok(out)
    }

    async fn update_organization(&self, org: &Organization) -> StoreResult<()> {
        let mut t = self.write();
        if t.organizations.values().any(|o| o.id != org.id && o.slug == org.slug) {
            return Err(StoreError::unique("organizations_slug_key"));
        }
        t.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn delete_organization(&self, id: OrganizationId) -> StoreResult<()> {
        let mut t = self.write();
        if t.properties.values().any(|p| p.organization_id == id) {
            return Err(fk("properties_organization_id_fkey"));
        }
        t.organizations.remove(&id);
        t.memberships.retain(|(org, _), _| *org != id);
        t.invitations.retain(|_, i| i.organization_id != id);
        for s in t.sessions.values_mut() {
            if s.active_organization_id == Some(id) {
                s.active_organization_id = None;
            }
        }
        Ok(())
    }

    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> StoreResult<Option<Membership>> {
        Ok(self.read().memberships.get(&(organization_id, user_id)).cloned())
    }

    async fn list_members(&self, organization_id: OrganizationId) -> StoreResult<Vec<MemberDetail>> {
        let t = self.read();
        let mut out: Vec<MemberDetail> = t
            .memberships
            .values()
            .filter(|m| m.organization_id == organization_id)
            .filter_map(|m| {
                t.users.get(&m.user_id).map(|u| MemberDetail {
                    membership: m.clone(),
                    email: u.email.to_string(),
                    name: u.name.clone(),
                })
            })
            .collect();
        out.sort_by_key(|m| m.membership.created_at);
        Ok(out)
    }

    async fn insert_membership(&self, membership: &Membership) -> StoreResult<()> {
        let mut t = self.write();
        let key = (membership.organization_id, membership.user_id);
        if t.memberships.contains_key(&key) {
            return Err(StoreError::unique("memberships_pkey"));
        }
        if !t.organizations.contains_key(&membership.organization_id) {
            return Err(fk("memberships_organization_id_fkey"));
        }
        t.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn update_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<()> {
        if let Some(m) = self.write().memberships.get_mut(&(organization_id, user_id)) {
            m.role = role;
        }
        Ok(())
    }

    async fn delete_membership(&self, organization_id: OrganizationId, user_id: UserId) -> StoreResult<()> {
        self.write().memberships.remove(&(organization_id, user_id));
        Ok(())
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        let mut t = self.write();
        if !t.organizations.contains_key(&invitation.organization_id) {
            return Err(fk("invitations_organization_id_fkey"));
        }
        t.invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn find_invitation(&self, id: InvitationId) -> StoreResult<Option<Invitation>> {
        Ok(self.read().invitations.get(&id).cloned())
    }

    async fn list_invitations(&self, organization_id: OrganizationId) -> StoreResult<Vec<Invitation>> {
        let t = self.read();
        Ok(newest_first(
            t.invitations
                .values()
                .filter(|i| i.organization_id == organization_id)
                .cloned(),
            |i| i.created_at,
        ))
    }

    async fn update_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        self.write().invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }
}

#[async_trait]
impl PropertyStore for InMemoryStore {
    async fn insert_property(&self, property: &Property) -> StoreResult<()> {
        let mut t = self.write();
        if !t.organizations.contains_key(&property.organization_id) {
            return Err(fk("properties_organization_id_fkey"));
        }
        t.properties.insert(property.id, property.clone());
        Ok(())
    }

    async fn find_property(&self, id: PropertyId) -> StoreResult<Option<Property>> {
        Ok(self.read().properties.get(&id).cloned())
    }

    async fn list_properties(&self, organization_id: OrganizationId) -> StoreResult<Vec<Property>> {
        let t = self.read();
        Ok(newest_first(
            t.properties
                .values()
                .filter(|p| p.organization_id == organization_id)
                .cloned(),
            |p| p.created_at,
        ))
    }

    async fn update_property(&self, property: &Property) -> StoreResult<()> {
        self.write().properties.insert(property.id, property.clone());
        Ok(())
    }

    async fn delete_property(&self, id: PropertyId) -> StoreResult<()> {
        let mut t = self.write();
        let unit_ids: Vec<UnitId> = t
            .units
            .values()
            .filter(|u| u.property_id == id)
            .map(|u| u.id)
            .collect();
        if t.tenancies.values().any(|x| unit_ids.contains(&x.unit_id)) {
            return Err(fk("tenancies_unit_id_fkey"));
        }
        for b in t.bookings.values_mut() {
            if b.unit_id.is_some_and(|u| unit_ids.contains(&u)) {
                b.unit_id = None;
            }
        }
        t.units.retain(|_, u| u.property_id != id);
        t.properties.remove(&id);
        Ok(())
    }

    async fn insert_unit(&self, unit: &Unit) -> StoreResult<()> {
        let mut t = self.write();
        if !t.properties.contains_key(&unit.property_id) {
            return Err(fk("units_property_id_fkey"));
        }
        if t
            .units
            .values()
            .any(|u| u.property_id == unit.property_id && u.unit_number == unit.unit_number)
        {
            return Err(StoreError::unique("units_property_unit_number_key"));
        }
        t.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn find_unit(&self, id: UnitId) -> StoreResult<Option<Unit>> {
        Ok(self.read().units.get(&id).cloned())
    }

    async fn list_units(&self, property_id: PropertyId) -> StoreResult<Vec<Unit>> {
        let t = self.read();
        let mut units: Vec<Unit> = t
            .units
            .values()
            .filter(|u| u.property_id == property_id)
            .cloned()
            .collect();
        units.sort_by(|a, b| a.unit_number.cmp(&b.unit_number));
        Ok(units)
    }

    async fn list_units_for_organization(&self, organization_id: OrganizationId) -> StoreResult<Vec<Unit>> {
        Ok(self
            .read()
            .units
            .values()
            .filter(|u| u.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn update_unit(&self, unit: &Unit) -> StoreResult<()> {
        let mut t = self.write();
        if t.units.values().any(|u| {
            u.id != unit.id && u.property_id == unit.property_id && u.unit_number == unit.unit_number
        }) {
            return Err(StoreError::unique("units_property_unit_number_key"));
        }
        t.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn delete_unit(&self, id: UnitId) -> StoreResult<()> {
        let mut t = self.write();
        if t.tenancies.values().any(|x| x.unit_id == id) {
            return Err(fk("tenancies_unit_id_fkey"));
        }
        for b in t.bookings.values_mut() {
            if b.unit_id == Some(id) {
                b.unit_id = None;
            }
        }
        t.units.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TenancyStore for InMemoryStore {
    async fn insert_tenancy(&self, tenancy: &Tenancy) -> StoreResult<()> {
        let mut t = self.write();
        if !t.units.contains_key(&tenancy.unit_id) {
            return Err(fk("tenancies_unit_id_fkey"));
        }
        if !t.users.contains_key(&tenancy.tenant_id) {
            return Err(fk("tenancies_tenant_id_fkey"));
        }
        t.tenancies.insert(tenancy.id, tenancy.clone());
        Ok(())
    }

    async fn find_tenancy(&self, id: TenancyId) -> StoreResult<Option<Tenancy>> {
        Ok(self.read().tenancies.get(&id).cloned())
    }

    async fn list_tenancies(&self, organization_id: OrganizationId) -> StoreResult<Vec<Tenancy>> {
        let t = self.read();
        Ok(newest_first(
            t.tenancies
                .values()
                .filter(|x| x.organization_id == organization_id)
                .cloned(),
            |x| x.created_at,
        ))
    }

    async fn list_tenancies_for_unit(&self, unit_id: UnitId) -> StoreResult<Vec<Tenancy>> {
        let t = self.read();
        Ok(newest_first(
            t.tenancies.values().filter(|x| x.unit_id == unit_id).cloned(),
            |x| x.created_at,
        ))
    }

    async fn update_tenancy(&self, tenancy: &Tenancy) -> StoreResult<()> {
        self.write().tenancies.insert(tenancy.id, tenancy.clone());
        Ok(())
    }

    async fn delete_tenancy(&self, id: TenancyId) -> StoreResult<()> {
        let mut t = self.write();
        if t.invoices.values().any(|i| i.tenancy_id == id) {
            return Err(fk("invoices_tenancy_id_fkey"));
        }
        for p in t.payments.values_mut() {
            if p.tenancy_id == Some(id) {
                p.tenancy_id = None;
            }
        }
        t.tenancies.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut t = self.write();
        if !t.tenancies.contains_key(&invoice.tenancy_id) {
            return Err(fk("invoices_tenancy_id_fkey"));
        }
        t.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn find_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(self.read().invoices.get(&id).cloned())
    }

    async fn list_invoices(&self, organization_id: OrganizationId) -> StoreResult<Vec<Invoice>> {
        let t = self.read();
        Ok(newest_first(
            t.invoices
                .values()
                .filter(|i| i.organization_id == organization_id)
                .cloned(),
            |i| i.created_at,
        ))
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        self.write().invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()> {
        let mut t = self.write();
        if t.payments.values().any(|p| p.invoice_id == Some(id)) {
            return Err(fk("payments_invoice_id_fkey"));
        }
        t.invoices.remove(&id);
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> StoreResult<()> {
        let mut t = self.write();
        if payment.invoice_id.is_some_and(|id| !t.invoices.contains_key(&id)) {
            return Err(fk("payments_invoice_id_fkey"));
        }
        if payment.guest_id.is_some_and(|id| !t.guests.contains_key(&id)) {
            return Err(fk("payments_guest_id_fkey"));
        }
        t.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_payment(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self.read().payments.get(&id).cloned())
    }

    async fn list_payments(&self, organization_id: OrganizationId) -> StoreResult<Vec<Payment>> {
        let t = self.read();
        Ok(newest_first(
            t.payments
                .values()
                .filter(|p| p.organization_id == organization_id)
                .cloned(),
            |p| p.created_at,
        ))
    }

    async fn list_payments_for_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>> {
        let t = self.read();
        Ok(newest_first(
            t.payments
                .values()
                .filter(|p| p.invoice_id == Some(invoice_id))
                .cloned(),
            |p| p.created_at,
        ))
    }

    async fn list_payments_for_guest(&self, guest_id: GuestId) -> StoreResult<Vec<Payment>> {
        let t = self.read();
        Ok(newest_first(
            t.payments
                .values()
                .filter(|p| p.guest_id == Some(guest_id))
                .cloned(),
            |p| p.created_at,
        ))
    }

    async fn update_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.write().payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn delete_payment(&self, id: PaymentId) -> StoreResult<()> {
        self.write().payments.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl GuestStore for InMemoryStore {
    async fn insert_guest(&self, guest: &Guest) -> StoreResult<()> {
        let mut t = self.write();
        check_guest_unique(&t, guest)?;
        t.guests.insert(guest.id, guest.clone());
        Ok(())
    }

    async fn find_guest(&self, id: GuestId) -> StoreResult<Option<Guest>> {
        Ok(self.read().guests.get(&id).cloned())
    }

    async fn list_guests(&self, created_by: UserId) -> StoreResult<Vec<Guest>> {
        let t = self.read();
        Ok(newest_first(
            t.guests
                .values()
                .filter(|g| g.created_by == created_by)
                .cloned(),
            |g| g.created_at,
        ))
    }

    async fn update_guest(&self, guest: &Guest) -> StoreResult<()> {
        let mut t = self.write();
        check_guest_unique(&t, guest)?;
        t.guests.insert(guest.id, guest.clone());
        Ok(())
    }

    async fn delete_guest(&self, id: GuestId) -> StoreResult<()> {
        let mut t = self.write();
        t.bookings.retain(|_, b| b.guest_id != id);
        for p in t.payments.values_mut() {
            if p.guest_id == Some(id) {
                p.guest_id = None;
            }
        }
        t.guests.remove(&id);
        Ok(())
    }

    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        let mut t = self.write();
        if !t.guests.contains_key(&booking.guest_id) {
            return Err(fk("bookings_guest_id_fkey"));
        }
        t.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.read().bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, guest_id: GuestId) -> StoreResult<Vec<Booking>> {
        let t = self.read();
        let mut out: Vec<Booking> = t
            .bookings
            .values()
            .filter(|b| b.guest_id == guest_id)
            .cloned()
            .collect();
        out.sort_by_key(|b| std::cmp::Reverse(b.check_in));
        Ok(out)
    }

    async fn list_bookings_for_unit(&self, unit_id: UnitId) -> StoreResult<Vec<Booking>> {
        let t = self.read();
        let mut out: Vec<Booking> = t
            .bookings
            .values()
            .filter(|b| b.unit_id == Some(unit_id))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.check_in);
        Ok(out)
    }

    async fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        self.write().bookings.insert(booking.id, booking.clone());
        Ok(())
    }
}

fn check_guest_unique(t: &Tables, guest: &Guest) -> StoreResult<()> {
    let mine = || {
        t.guests
            .values()
            .filter(|g| g.id != guest.id && g.created_by == guest.created_by)
    };
    if mine().any(|g| g.phone == guest.phone) {
        return Err(StoreError::unique("guests_created_by_phone_key"));
    }
    if guest.email.is_some() && mine().any(|g| g.email == guest.email) {
        return Err(StoreError::unique("guests_created_by_email_key"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use miliki_guests::NewGuestInput;

    fn guest(owner: UserId, phone: &str) -> Guest {
        let input = NewGuestInput {
            name: "Guest".into(),
            phone: phone.into(),
            email: None,
            id_number: None,
            notes: None,
        }
        .validate()
        .unwrap();
        Guest::register(owner, input, Utc::now())
    }

    #[tokio::test]
    async fn guest_phone_is_unique_per_creator() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        store.insert_guest(&guest(owner, "0712000000")).await.unwrap();

        let err = store.insert_guest(&guest(owner, "0712000000")).await.unwrap_err();
        assert_eq!(err, StoreError::unique("guests_created_by_phone_key"));

        // A different creator may register the same phone.
        store.insert_guest(&guest(UserId::new(), "0712000000")).await.unwrap();
    }

    #[tokio::test]
    async fn session_needs_existing_user() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let err = store
            .insert_session(&SessionRecord {
                id: SessionId::new(),
                user_id: UserId::new(),
                token_hash: "h".into(),
                active_organization_id: None,
                created_at: now,
                expires_at: now,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }
}
