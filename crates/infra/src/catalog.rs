//! Static operation catalog.
//!
//! Every operation the service exposes is declared here once: which
//! permission guards it, which cache tag kinds its result is registered
//! under (reads) or which tag kinds it invalidates (writes), and the message
//! returned on success. The access wrapper renders concrete tags from these
//! declarations, so cache coherence can be checked against the catalog alone.

use miliki_auth::{Action, Permission, Resource};
use miliki_core::{GuestId, OrganizationId, PropertyId, UserId};

/// Families of cache tags. A tag is `<prefix>-<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    OrganizationsByUser,
    Organization,
    Members,
    Invitations,
    Properties,
    Property,
    PropertyStats,
    UnitsByProperty,
    Tenancies,
    Invoices,
    Payments,
    GuestsByUser,
    BookingsByGuest,
}

impl TagKind {
    pub fn prefix(self) -> &'static str {
        match self {
            TagKind::OrganizationsByUser => "organizations-by-user",
            TagKind::Organization => "organization",
            TagKind::Members => "members",
            TagKind::Invitations => "invitations",
            TagKind::Properties => "properties",
            TagKind::Property => "property",
            TagKind::PropertyStats => "property-stats",
            TagKind::UnitsByProperty => "units-by-property",
            TagKind::Tenancies => "tenancies",
            TagKind::Invoices => "invoices",
            TagKind::Payments => "payments",
            TagKind::GuestsByUser => "guests-by-user",
            TagKind::BookingsByGuest => "bookings-by-guest",
        }
    }

    /// Render this kind for the given ids, or `None` when the id it keys on
    /// is not known.
    pub fn render(self, ids: &TagIds) -> Option<String> {
        let id = match self {
            TagKind::OrganizationsByUser | TagKind::GuestsByUser => ids.user?.to_string(),
            TagKind::Organization
            | TagKind::Members
            | TagKind::Invitations
            | TagKind::Properties
            | TagKind::PropertyStats
            | TagKind::Tenancies
            | TagKind::Invoices
            | TagKind::Payments => ids.organization?.to_string(),
            TagKind::Property | TagKind::UnitsByProperty => ids.property?.to_string(),
            TagKind::BookingsByGuest => ids.guest?.to_string(),
        };
        Some(format!("{}-{id}", self.prefix()))
    }
}

/// Identifiers tags are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagIds {
    pub user: Option<UserId>,
    pub organization: Option<OrganizationId>,
    pub property: Option<PropertyId>,
    pub guest: Option<GuestId>,
}

impl TagIds {
    pub fn user(mut self, id: UserId) -> Self {
        self.user = Some(id);
        self
    }

    pub fn organization(mut self, id: OrganizationId) -> Self {
        self.organization = Some(id);
        self
    }

    pub fn property(mut self, id: PropertyId) -> Self {
        self.property = Some(id);
        self
    }

    pub fn guest(mut self, id: GuestId) -> Self {
        self.guest = Some(id);
        self
    }

    /// Values from `other` win where present.
    pub fn merged(self, other: TagIds) -> Self {
        Self {
            user: other.user.or(self.user),
            organization: other.organization.or(self.organization),
            property: other.property.or(self.property),
            guest: other.guest.or(self.guest),
        }
    }

    pub fn render(&self, kinds: &[TagKind]) -> Vec<String> {
        kinds.iter().filter_map(|k| k.render(self)).collect()
    }
}

/// How an operation is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// No session needed (sign-up, sign-in).
    Public,
    /// Any signed-in user; the operation checks anything further itself.
    Session,
    /// Evaluated against the permission table.
    Table,
}

#[derive(Debug)]
pub struct Operation {
    pub name: &'static str,
    pub resource: Option<Resource>,
    pub action: Action,
    pub guard: Guard,
    /// Tag kinds a successful read registers its cached result under.
    pub reads: &'static [TagKind],
    /// Tag kinds a successful write invalidates.
    pub invalidates: &'static [TagKind],
    pub message: &'static str,
}

impl Operation {
    pub fn permission(&self) -> Option<Permission> {
        self.resource.map(|r| Permission::new(r, self.action))
    }

    pub fn is_write(&self) -> bool {
        self.action.is_mutation()
    }
}

use Action::{Create, Delete, Read, Update};
use TagKind::*;

macro_rules! op {
    ($id:ident, $name:literal, $res:expr, $action:expr, $guard:expr, reads: [$($r:expr),*], invalidates: [$($w:expr),*], $msg:literal) => {
        pub const $id: Operation = Operation {
            name: $name,
            resource: $res,
            action: $action,
            guard: $guard,
            reads: &[$($r),*],
            invalidates: &[$($w),*],
            message: $msg,
        };
    };
}

const ORG: Option<Resource> = Some(Resource::Organization);
const MEMBER: Option<Resource> = Some(Resource::Member);
const INVITATION: Option<Resource> = Some(Resource::Invitation);
const PROPERTY: Option<Resource> = Some(Resource::Property);
const UNIT: Option<Resource> = Some(Resource::Unit);
const TENANCY: Option<Resource> = Some(Resource::Tenancy);
const INVOICE: Option<Resource> = Some(Resource::Invoice);
const PAYMENT: Option<Resource> = Some(Resource::Payment);
const GUEST: Option<Resource> = Some(Resource::Guest);
const BOOKING: Option<Resource> = Some(Resource::Booking);

// Auth
op!(SIGN_UP, "sign_up", None, Create, Guard::Public, reads: [], invalidates: [], "Account created successfully");
op!(SIGN_IN, "sign_in", None, Create, Guard::Public, reads: [], invalidates: [], "Signed in successfully");
op!(SIGN_OUT, "sign_out", None, Delete, Guard::Session, reads: [], invalidates: [], "Signed out successfully");
op!(CURRENT_SESSION, "current_session", None, Read, Guard::Session, reads: [], invalidates: [], "Session retrieved successfully");

// Organizations
op!(CREATE_ORGANIZATION, "create_organization", ORG, Create, Guard::Table,
    reads: [], invalidates: [OrganizationsByUser, Organization], "Organization created successfully");
op!(LIST_MY_ORGANIZATIONS, "list_my_organizations", ORG, Read, Guard::Session,
    reads: [OrganizationsByUser], invalidates: [], "Organizations retrieved successfully");
op!(GET_ORGANIZATION, "get_organization", ORG, Read, Guard::Table,
    reads: [Organization], invalidates: [], "Organization retrieved successfully");
op!(UPDATE_ORGANIZATION, "update_organization", ORG, Update, Guard::Table,
    reads: [], invalidates: [OrganizationsByUser, Organization], "Organization updated successfully");
op!(DELETE_ORGANIZATION, "delete_organization", ORG, Delete, Guard::Table,
    reads: [], invalidates: [OrganizationsByUser, Organization, Members, Invitations], "Organization deleted successfully");
op!(SET_ACTIVE_ORGANIZATION, "set_active_organization", None, Update, Guard::Session,
    reads: [], invalidates: [], "Active organization updated");

// Members
op!(LIST_MEMBERS, "list_members", MEMBER, Read, Guard::Table,
    reads: [Members], invalidates: [], "Members retrieved successfully");
op!(UPDATE_MEMBER_ROLE, "update_member_role", MEMBER, Update, Guard::Table,
    reads: [], invalidates: [Members, OrganizationsByUser], "Member role updated successfully");
op!(REMOVE_MEMBER, "remove_member", MEMBER, Delete, Guard::Table,
    reads: [], invalidates: [Members, OrganizationsByUser], "Member removed successfully");

// Invitations
op!(CREATE_INVITATION, "create_invitation", INVITATION, Create, Guard::Table,
    reads: [], invalidates: [Invitations], "Invitation sent successfully");
op!(LIST_INVITATIONS, "list_invitations", INVITATION, Read, Guard::Table,
    reads: [Invitations], invalidates: [], "Invitations retrieved successfully");
op!(CANCEL_INVITATION, "cancel_invitation", INVITATION, Update, Guard::Table,
    reads: [], invalidates: [Invitations], "Invitation cancelled successfully");
op!(ACCEPT_INVITATION, "accept_invitation", INVITATION, Update, Guard::Session,
    reads: [], invalidates: [Invitations, Members, OrganizationsByUser], "Invitation accepted successfully");

// Properties
op!(CREATE_PROPERTY, "create_property", PROPERTY, Create, Guard::Table,
    reads: [], invalidates: [Properties, Property, PropertyStats], "Property created successfully");
op!(LIST_PROPERTIES, "list_properties", PROPERTY, Read, Guard::Table,
    reads: [Properties], invalidates: [], "Properties retrieved successfully");
op!(GET_PROPERTY, "get_property", PROPERTY, Read, Guard::Table,
    reads: [Property], invalidates: [], "Property retrieved successfully");
op!(UPDATE_PROPERTY, "update_property", PROPERTY, Update, Guard::Table,
    reads: [], invalidates: [Properties, Property, PropertyStats], "Property updated successfully");
op!(DELETE_PROPERTY, "delete_property", PROPERTY, Delete, Guard::Table,
    reads: [], invalidates: [Properties, Property, PropertyStats, UnitsByProperty, Tenancies], "Property deleted successfully");
op!(PROPERTY_STATS, "property_stats", PROPERTY, Read, Guard::Table,
    reads: [PropertyStats], invalidates: [], "Property statistics retrieved successfully");

// Units
op!(CREATE_UNIT, "create_unit", UNIT, Create, Guard::Table,
    reads: [], invalidates: [UnitsByProperty, PropertyStats], "Unit created successfully");
op!(LIST_UNITS, "list_units", UNIT, Read, Guard::Table,
    reads: [UnitsByProperty], invalidates: [], "Units retrieved successfully");
op!(GET_UNIT, "get_unit", UNIT, Read, Guard::Table,
    reads: [UnitsByProperty], invalidates: [], "Unit retrieved successfully");
op!(UPDATE_UNIT, "update_unit", UNIT, Update, Guard::Table,
    reads: [], invalidates: [UnitsByProperty, PropertyStats], "Unit updated successfully");
op!(UPDATE_UNIT_STATUS, "update_unit_status", UNIT, Update, Guard::Table,
    reads: [], invalidates: [UnitsByProperty, PropertyStats], "Unit status updated successfully");
op!(DELETE_UNIT, "delete_unit", UNIT, Delete, Guard::Table,
    reads: [], invalidates: [UnitsByProperty, PropertyStats, Tenancies], "Unit deleted successfully");

// Tenancies
op!(CREATE_TENANCY, "create_tenancy", TENANCY, Create, Guard::Table,
    reads: [], invalidates: [Tenancies], "Tenancy created successfully");
op!(LIST_TENANCIES, "list_tenancies", TENANCY, Read, Guard::Table,
    reads: [Tenancies], invalidates: [], "Tenancies retrieved successfully");
op!(GET_TENANCY, "get_tenancy", TENANCY, Read, Guard::Table,
    reads: [Tenancies], invalidates: [], "Tenancy retrieved successfully");
op!(UPDATE_TENANCY_STATUS, "update_tenancy_status", TENANCY, Update, Guard::Table,
    reads: [], invalidates: [Tenancies, UnitsByProperty, PropertyStats], "Tenancy status updated successfully");
op!(DELETE_TENANCY, "delete_tenancy", TENANCY, Delete, Guard::Table,
    reads: [], invalidates: [Tenancies], "Tenancy deleted successfully");

// Invoices
op!(CREATE_INVOICE, "create_invoice", INVOICE, Create, Guard::Table,
    reads: [], invalidates: [Invoices], "Invoice created successfully");
op!(LIST_INVOICES, "list_invoices", INVOICE, Read, Guard::Table,
    reads: [Invoices], invalidates: [], "Invoices retrieved successfully");
op!(GET_INVOICE, "get_invoice", INVOICE, Read, Guard::Table,
    reads: [Invoices], invalidates: [], "Invoice retrieved successfully");
op!(UPDATE_INVOICE_STATUS, "update_invoice_status", INVOICE, Update, Guard::Table,
    reads: [], invalidates: [Invoices], "Invoice status updated successfully");
op!(DELETE_INVOICE, "delete_invoice", INVOICE, Delete, Guard::Table,
    reads: [], invalidates: [Invoices], "Invoice deleted successfully");

// Payments
op!(RECORD_PAYMENT, "record_payment", PAYMENT, Create, Guard::Table,
    reads: [], invalidates: [Payments, Invoices], "Payment recorded successfully");
op!(LIST_PAYMENTS, "list_payments", PAYMENT, Read, Guard::Table,
    reads: [Payments], invalidates: [], "Payments retrieved successfully");
op!(GET_PAYMENT, "get_payment", PAYMENT, Read, Guard::Table,
    reads: [Payments], invalidates: [], "Payment retrieved successfully");
op!(UPDATE_PAYMENT_STATUS, "update_payment_status", PAYMENT, Update, Guard::Table,
    reads: [], invalidates: [Payments, Invoices], "Payment status updated successfully");
op!(DELETE_PAYMENT, "delete_payment", PAYMENT, Delete, Guard::Table,
    reads: [], invalidates: [Payments], "Payment deleted successfully");

// Guests
op!(CREATE_GUEST, "create_guest", GUEST, Create, Guard::Table,
    reads: [], invalidates: [GuestsByUser], "Guest created successfully");
op!(LIST_GUESTS, "list_guests", GUEST, Read, Guard::Table,
    reads: [GuestsByUser], invalidates: [], "Guests retrieved successfully");
op!(GET_GUEST, "get_guest", GUEST, Read, Guard::Table,
    reads: [GuestsByUser], invalidates: [], "Guest retrieved successfully");
op!(UPDATE_GUEST, "update_guest", GUEST, Update, Guard::Table,
    reads: [], invalidates: [GuestsByUser], "Guest updated successfully");
op!(DELETE_GUEST, "delete_guest", GUEST, Delete, Guard::Table,
    reads: [], invalidates: [GuestsByUser, BookingsByGuest], "Guest deleted successfully");

// Bookings
op!(CREATE_BOOKING, "create_booking", BOOKING, Create, Guard::Table,
    reads: [], invalidates: [BookingsByGuest], "Booking created successfully");
op!(LIST_BOOKINGS, "list_bookings", BOOKING, Read, Guard::Table,
    reads: [BookingsByGuest], invalidates: [], "Bookings retrieved successfully");
op!(UPDATE_BOOKING_STATUS, "update_booking_status", BOOKING, Update, Guard::Table,
    reads: [], invalidates: [BookingsByGuest], "Booking status updated successfully");

pub static CATALOG: &[&Operation] = &[
    &SIGN_UP,
    &SIGN_IN,
    &SIGN_OUT,
    &CURRENT_SESSION,
    &CREATE_ORGANIZATION,
    &LIST_MY_ORGANIZATIONS,
    &GET_ORGANIZATION,
    &UPDATE_ORGANIZATION,
    &DELETE_ORGANIZATION,
    &SET_ACTIVE_ORGANIZATION,
    &LIST_MEMBERS,
    &UPDATE_MEMBER_ROLE,
    &REMOVE_MEMBER,
    &CREATE_INVITATION,
    &LIST_INVITATIONS,
    &CANCEL_INVITATION,
    &ACCEPT_INVITATION,
    &CREATE_PROPERTY,
    &LIST_PROPERTIES,
    &GET_PROPERTY,
    &UPDATE_PROPERTY,
    &DELETE_PROPERTY,
    &PROPERTY_STATS,
    &CREATE_UNIT,
    &LIST_UNITS,
    &GET_UNIT,
    &UPDATE_UNIT,
    &UPDATE_UNIT_STATUS,
    &DELETE_UNIT,
    &CREATE_TENANCY,
    &LIST_TENANCIES,
    &GET_TENANCY,
    &UPDATE_TENANCY_STATUS,
    &DELETE_TENANCY,
    &CREATE_INVOICE,
    &LIST_INVOICES,
    &GET_INVOICE,
    &UPDATE_INVOICE_STATUS,
    &DELETE_INVOICE,
    &RECORD_PAYMENT,
    &LIST_PAYMENTS,
    &GET_PAYMENT,
    &UPDATE_PAYMENT_STATUS,
    &DELETE_PAYMENT,
    &CREATE_GUEST,
    &LIST_GUESTS,
    &GET_GUEST,
    &UPDATE_GUEST,
    &DELETE_GUEST,
    &CREATE_BOOKING,
    &LIST_BOOKINGS,
    &UPDATE_BOOKING_STATUS,
];

pub fn find(name: &str) -> Option<&'static Operation> {
    CATALOG.iter().copied().find(|op| op.name == name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn writes_invalidate_every_tag_their_resource_reads_register() {
        for resource in Resource::ALL {
            let read_tags: HashSet<TagKind> = CATALOG
                .iter()
                .filter(|op| op.resource == Some(resource) && !op.is_write())
                .flat_map(|op| op.reads.iter().copied())
                .collect();
            for op in CATALOG
                .iter()
                .filter(|op| op.resource == Some(resource) && op.is_write())
            {
                let invalidated: HashSet<TagKind> = op.invalidates.iter().copied().collect();
                let missing: Vec<_> = read_tags.difference(&invalidated).collect();
                assert!(
                    missing.is_empty(),
                    "{} does not invalidate {:?}",
                    op.name,
                    missing
                );
            }
        }
    }

    #[test]
    fn reads_only_register_and_writes_only_invalidate() {
        for op in CATALOG {
            if op.is_write() {
                assert!(op.reads.is_empty(), "{} registers read tags", op.name);
            } else {
                assert!(op.invalidates.is_empty(), "{} invalidates tags", op.name);
            }
        }
    }

    #[test]
    fn table_guarded_operations_name_a_resource() {
        for op in CATALOG.iter().filter(|op| op.guard == Guard::Table) {
            assert!(op.permission().is_some(), "{} has no permission", op.name);
        }
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = CATALOG.iter().map(|op| op.name).collect();
        assert_eq!(names.len(), CATALOG.len());
        assert!(find("create_property").is_some());
    }

    #[test]
    fn tags_render_from_ids() {
        let org = OrganizationId::new();
        let ids = TagIds::default().organization(org);
        assert_eq!(
            ids.render(CREATE_PROPERTY.invalidates),
            vec![format!("properties-{org}"), format!("property-stats-{org}")]
        );
    }
}
