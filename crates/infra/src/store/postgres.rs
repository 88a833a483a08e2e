//! Postgres-backed stores.
//!
//! ## Error mapping
//!
//! | Postgres code | Meaning | `StoreError` |
//! |---|---|---|
//! | `23505` | unique violation | `UniqueViolation` |
//! | `23503` | foreign-key violation | `ForeignKeyViolation` |
//! | other | anything else | `Backend` |
//!
//! Tenant isolation is enforced above this layer: callers always check the
//! organization of a fetched record against the session before acting on it.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use miliki_auth::{Role, User};
use miliki_billing::{Invoice, Payment};
use miliki_core::{
    BookingId, EmailAddress, GuestId, InvitationId, InvoiceId, OrganizationId, PaymentId,
    PhoneNumber, PropertyId, SessionId, TenancyId, UnitId, UserId,
};
use miliki_guests::{Booking, Guest};
use miliki_leasing::Tenancy;
use miliki_organizations::{Invitation, Membership, Organization, Slug};
use miliki_properties::{Property, Unit};

use super::{
    BillingStore, GuestStore, MemberDetail, OrganizationStore, OrganizationSummary, PropertyStore,
    SessionRecord, SessionStore, StoreError, StoreResult, TenancyStore, UserStore,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres implementation of every store, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn apply_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    async fn exec(&self, operation: &'static str, q: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>) -> StoreResult<()> {
        q.execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }

    async fn fetch_opt<T>(
        &self,
        operation: &'static str,
        q: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        decode: fn(&PgRow) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn fetch_all<T>(
        &self,
        operation: &'static str,
        q: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        decode: fn(&PgRow) -> StoreResult<T>,
    ) -> StoreResult<Vec<T>> {
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(decode).collect()
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation { constraint },
                Some("23503") => StoreError::ForeignKeyViolation { constraint },
                _ if db_err.message().contains("duplicate key") => {
                    StoreError::UniqueViolation { constraint }
                }
                _ => StoreError::Backend(format!(
                    "database error in {operation}: {}",
                    db_err.message()
                )),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn parsed<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = get(row, column)?;
    raw.parse()
        .map_err(|e| StoreError::Backend(format!("invalid value in column {column}: {e}")))
}

fn parsed_opt<T>(row: &PgRow, column: &str) -> StoreResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = get(row, column)?;
    raw.map(|r| {
        r.parse()
            .map_err(|e| StoreError::Backend(format!("invalid value in column {column}: {e}")))
    })
    .transpose()
}

fn email(row: &PgRow, column: &str) -> StoreResult<EmailAddress> {
    let raw: String = get(row, column)?;
    EmailAddress::parse(&raw).map_err(|e| StoreError::Backend(format!("invalid email in {column}: {e}")))
}

fn decode_user(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        email: email(row, "email")?,
        username: get(row, "username")?,
        name: get(row, "name")?,
        platform_role: parsed(row, "platform_role")?,
        password_hash: get(row, "password_hash")?,
        created_at: get(row, "created_at")?,
    })
}

fn decode_session(row: &PgRow) -> StoreResult<SessionRecord> {
    Ok(SessionRecord {
        id: SessionId::from_uuid(get(row, "id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        token_hash: get(row, "token_hash")?,
        active_organization_id: get::<Option<Uuid>>(row, "active_organization_id")?
            .map(OrganizationId::from_uuid),
        created_at: get(row, "created_at")?,
        expires_at: get(row, "expires_at")?,
    })
}

fn decode_organization(row: &PgRow) -> StoreResult<Organization> {
    let slug: String = get(row, "slug")?;
    Ok(Organization {
        id: OrganizationId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        slug: Slug::parse(&slug).map_err(|e| StoreError::Backend(format!("invalid slug: {e}")))?,
        created_by: UserId::from_uuid(get(row, "created_by")?),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_summary(row: &PgRow) -> StoreResult<OrganizationSummary> {
    Ok(OrganizationSummary {
        organization: decode_organization(row)?,
        role: parsed(row, "role")?,
    })
}

fn decode_membership(row: &PgRow) -> StoreResult<Membership> {
    Ok(Membership {
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        role: parsed(row, "role")?,
        created_at: get(row, "created_at")?,
    })
}

fn decode_member(row: &PgRow) -> StoreResult<MemberDetail> {
    Ok(MemberDetail {
        membership: decode_membership(row)?,
        email: get(row, "email")?,
        name: get(row, "name")?,
    })
}

fn decode_invitation(row: &PgRow) -> StoreResult<Invitation> {
    Ok(Invitation {
        id: InvitationId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        email: email(row, "email")?,
        role: parsed(row, "role")?,
        status: parsed(row, "status")?,
        invited_by: UserId::from_uuid(get(row, "invited_by")?),
        created_at: get(row, "created_at")?,
        expires_at: get(row, "expires_at")?,
    })
}

fn decode_property(row: &PgRow) -> StoreResult<Property> {
    Ok(Property {
        id: PropertyId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        owner_id: UserId::from_uuid(get(row, "owner_id")?),
        name: get(row, "name")?,
        address: get(row, "address")?,
        city: get(row, "city")?,
        property_type: parsed(row, "property_type")?,
        description: get(row, "description")?,
        is_active: get(row, "is_active")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_unit(row: &PgRow) -> StoreResult<Unit> {
    Ok(Unit {
        id: UnitId::from_uuid(get(row, "id")?),
        property_id: PropertyId::from_uuid(get(row, "property_id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        unit_number: get(row, "unit_number")?,
        bedrooms: get(row, "bedrooms")?,
        bathrooms: get(row, "bathrooms")?,
        rent_amount: get(row, "rent_amount")?,
        status: parsed(row, "status")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_tenancy(row: &PgRow) -> StoreResult<Tenancy> {
    Ok(Tenancy {
        id: TenancyId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        unit_id: UnitId::from_uuid(get(row, "unit_id")?),
        tenant_id: UserId::from_uuid(get(row, "tenant_id")?),
        start_date: get(row, "start_date")?,
        end_date: get(row, "end_date")?,
        rent_amount: get(row, "rent_amount")?,
        deposit_amount: get(row, "deposit_amount")?,
        status: parsed(row, "status")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_invoice(row: &PgRow) -> StoreResult<Invoice> {
    Ok(Invoice {
        id: InvoiceId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        tenancy_id: TenancyId::from_uuid(get(row, "tenancy_id")?),
        amount: get(row, "amount")?,
        due_date: get(row, "due_date")?,
        status: parsed(row, "status")?,
        description: get(row, "description")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_payment(row: &PgRow) -> StoreResult<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        organization_id: OrganizationId::from_uuid(get(row, "organization_id")?),
        invoice_id: get::<Option<Uuid>>(row, "invoice_id")?.map(InvoiceId::from_uuid),
        tenancy_id: get::<Option<Uuid>>(row, "tenancy_id")?.map(TenancyId::from_uuid),
        guest_id: get::<Option<Uuid>>(row, "guest_id")?.map(GuestId::from_uuid),
        amount: get(row, "amount")?,
        method: parsed(row, "method")?,
        status: parsed(row, "status")?,
        reference: get(row, "reference")?,
        created_by: UserId::from_uuid(get(row, "created_by")?),
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_guest(row: &PgRow) -> StoreResult<Guest> {
    let phone: String = get(row, "phone")?;
    let email_raw: Option<String> = get(row, "email")?;
    Ok(Guest {
        id: GuestId::from_uuid(get(row, "id")?),
        created_by: UserId::from_uuid(get(row, "created_by")?),
        name: get(row, "name")?,
        phone: PhoneNumber::parse(&phone)
            .map_err(|e| StoreError::Backend(format!("invalid phone: {e}")))?,
        email: email_raw
            .map(|e| EmailAddress::parse(&e))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("invalid email: {e}")))?,
        id_number: get(row, "id_number")?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn decode_booking(row: &PgRow) -> StoreResult<Booking> {
    Ok(Booking {
        id: BookingId::from_uuid(get(row, "id")?),
        guest_id: GuestId::from_uuid(get(row, "guest_id")?),
        created_by: UserId::from_uuid(get(row, "created_by")?),
        unit_id: get::<Option<Uuid>>(row, "unit_id")?.map(UnitId::from_uuid),
        check_in: get(row, "check_in")?,
        check_out: get(row, "check_out")?,
        status: parsed(row, "status")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Store implementations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip_all, fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.exec(
            "insert_user",
            sqlx::query(
                "INSERT INTO users (id, email, username, name, platform_role, password_hash, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user.id.as_uuid())
            .bind(user.email.as_str())
            .bind(&user.username)
            .bind(&user.name)
            .bind(user.platform_role.as_str())
            .bind(&user.password_hash)
            .bind(user.created_at),
        )
        .await
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        self.fetch_opt(
            "find_user",
            sqlx::query("SELECT * FROM users WHERE id = $1").bind(id.as_uuid()),
            decode_user,
        )
        .await
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>> {
        self.fetch_opt(
            "find_user_by_email",
            sqlx::query("SELECT * FROM users WHERE email = $1").bind(email.as_str()),
            decode_user,
        )
        .await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, s: &SessionRecord) -> StoreResult<()> {
        self.exec(
            "insert_session",
            sqlx::query(
                "INSERT INTO sessions (id, user_id, token_hash, active_organization_id, created_at, expires_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(s.id.as_uuid())
            .bind(s.user_id.as_uuid())
            .bind(&s.token_hash)
            .bind(s.active_organization_id.map(|o| o.as_uuid()))
            .bind(s.created_at)
            .bind(s.expires_at),
        )
        .await
    }

    async fn find_session_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<SessionRecord>> {
        self.fetch_opt(
            "find_session",
            sqlx::query("SELECT * FROM sessions WHERE token_hash = $1").bind(token_hash),
            decode_session,
        )
        .await
    }

    async fn set_active_organization(
        &self,
        id: SessionId,
        organization_id: Option<OrganizationId>,
    ) -> StoreResult<()> {
        self.exec(
            "set_active_organization",
            sqlx::query("UPDATE sessions SET active_organization_id = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(organization_id.map(|o| o.as_uuid())),
        )
        .await
    }

    async fn delete_session(&self, id: SessionId) -> StoreResult<()> {
        self.exec(
            "delete_session",
            sqlx::query("DELETE FROM sessions WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }
}

#[async_trait]
impl OrganizationStore for PgStore {
    #[instrument(skip_all, fields(organization_id = %org.id), err)]
    async fn insert_organization(&self, org: &Organization, founder: &Membership) -> StoreResult<()> {
        // One statement: the founding membership is inserted by a data-modifying CTE.
        self.exec(
            "insert_organization",
            sqlx::query(
                "WITH org AS (
                     INSERT INTO organizations (id, name, slug, created_by, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING id
                 )
                 INSERT INTO memberships (organization_id, user_id, role, created_at)
                 SELECT id, $7, $8, $5 FROM org",
            )
            .bind(org.id.as_uuid())
            .bind(&org.name)
            .bind(org.slug.as_str())
            .bind(org.created_by.as_uuid())
            .bind(org.created_at)
            .bind(org.updated_at)
            .bind(founder.user_id.as_uuid())
            .bind(founder.role.as_str()),
        )
        .await
    }

    async fn find_organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>> {
        self.fetch_opt(
            "find_organization",
            sqlx::query("SELECT * FROM organizations WHERE id = $1").bind(id.as_uuid()),
            decode_organization,
        )
        .await
    }

    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>> {
        self.fetch_opt(
            "find_organization_by_slug",
            sqlx::query("SELECT * FROM organizations WHERE slug = $1").bind(slug),
            decode_organization,
        )
        .await
    }

    async fn list_organizations_for_user(&self, user_id: UserId) -> StoreResult<Vec<OrganizationSummary>> {
        self.fetch_all(
            "list_organizations_for_user",
            sqlx::query(
                "SELECT o.*, m.role FROM organizations o
                 JOIN memberships m ON m.organization_id = o.id
                 WHERE m.user_id = $1
                 ORDER BY o.name",
            )
            .bind(user_id.as_uuid()),
            decode_summary,
        )
        .await
    }

    async fn update_organization(&self, org: &Organization) -> StoreResult<()> {
        self.exec(
            "update_organization",
            sqlx::query("UPDATE organizations SET name = $2, slug = $3, updated_at = $4 WHERE id = $1")
                .bind(org.id.as_uuid())
                .bind(&org.name)
                .bind(org.slug.as_str())
                .bind(org.updated_at),
        )
        .await
    }

    async fn delete_organization(&self, id: OrganizationId) -> StoreResult<()> {
        self.exec(
            "delete_organization",
            sqlx::query("DELETE FROM organizations WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }

    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> StoreResult<Option<Membership>> {
        self.fetch_opt(
            "find_membership",
            sqlx::query("SELECT * FROM memberships WHERE organization_id = $1 AND user_id = $2")
                .bind(organization_id.as_uuid())
                .bind(user_id.as_uuid()),
            decode_membership,
        )
        .await
    }

    async fn list_members(&self, organization_id: OrganizationId) -> StoreResult<Vec<MemberDetail>> {
        self.fetch_all(
            "list_members",
            sqlx::query(
                "SELECT m.*, u.email, u.name FROM memberships m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.organization_id = $1
                 ORDER BY m.created_at",
            )
            .bind(organization_id.as_uuid()),
            decode_member,
        )
        .await
    }

    async fn insert_membership(&self, m: &Membership) -> StoreResult<()> {
        self.exec(
            "insert_membership",
            sqlx::query(
                "INSERT INTO memberships (organization_id, user_id, role, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(m.organization_id.as_uuid())
            .bind(m.user_id.as_uuid())
            .bind(m.role.as_str())
            .bind(m.created_at),
        )
        .await
    }

    async fn update_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<()> {
        self.exec(
            "update_membership_role",
            sqlx::query("UPDATE memberships SET role = $3 WHERE organization_id = $1 AND user_id = $2")
                .bind(organization_id.as_uuid())
                .bind(user_id.as_uuid())
                .bind(role.as_str()),
        )
        .await
    }

    async fn delete_membership(&self, organization_id: OrganizationId, user_id: UserId) -> StoreResult<()> {
        self.exec(
            "delete_membership",
            sqlx::query("DELETE FROM memberships WHERE organization_id = $1 AND user_id = $2")
                .bind(organization_id.as_uuid())
                .bind(user_id.as_uuid()),
        )
        .await
    }

    async fn insert_invitation(&self, i: &Invitation) -> StoreResult<()> {
        self.exec(
            "insert_invitation",
            sqlx::query(
                "INSERT INTO invitations (id, organization_id, email, role, status, invited_by, created_at, expires_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(i.id.as_uuid())
            .bind(i.organization_id.as_uuid())
            .bind(i.email.as_str())
            .bind(i.role.as_str())
            .bind(i.status.as_str())
            .bind(i.invited_by.as_uuid())
            .bind(i.created_at)
            .bind(i.expires_at),
        )
        .await
    }

    async fn find_invitation(&self, id: InvitationId) -> StoreResult<Option<Invitation>> {
        self.fetch_opt(
            "find_invitation",
            sqlx::query("SELECT * FROM invitations WHERE id = $1").bind(id.as_uuid()),
            decode_invitation,
        )
        .await
    }

    async fn list_invitations(&self, organization_id: OrganizationId) -> StoreResult<Vec<Invitation>> {
        self.fetch_all(
            "list_invitations",
            sqlx::query("SELECT * FROM invitations WHERE organization_id = $1 ORDER BY created_at DESC")
                .bind(organization_id.as_uuid()),
            decode_invitation,
        )
        .await
    }

    async fn update_invitation(&self, i: &Invitation) -> StoreResult<()> {
        self.exec(
            "update_invitation",
            sqlx::query("UPDATE invitations SET status = $2 WHERE id = $1")
                .bind(i.id.as_uuid())
                .bind(i.status.as_str()),
        )
        .await
    }
}

#[async_trait]
impl PropertyStore for PgStore {
    #[instrument(skip_all, fields(property_id = %p.id, organization_id = %p.organization_id), err)]
    async fn insert_property(&self, p: &Property) -> StoreResult<()> {
        self.exec(
            "insert_property",
            sqlx::query(
                "INSERT INTO properties
                     (id, organization_id, owner_id, name, address, city, property_type, description, is_active, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(p.id.as_uuid())
            .bind(p.organization_id.as_uuid())
            .bind(p.owner_id.as_uuid())
            .bind(&p.name)
            .bind(&p.address)
            .bind(&p.city)
            .bind(p.property_type.as_str())
            .bind(&p.description)
            .bind(p.is_active)
            .bind(p.created_at)
            .bind(p.updated_at),
        )
        .await
    }

    async fn find_property(&self, id: PropertyId) -> StoreResult<Option<Property>> {
        self.fetch_opt(
            "find_property",
            sqlx::query("SELECT * FROM properties WHERE id = $1").bind(id.as_uuid()),
            decode_property,
        )
        .await
    }

    async fn list_properties(&self, organization_id: OrganizationId) -> StoreResult<Vec<Property>> {
        self.fetch_all(
            "list_properties",
            sqlx::query("SELECT * FROM properties WHERE organization_id = $1 ORDER BY created_at DESC")
                .bind(organization_id.as_uuid()),
            decode_property,
        )
        .await
    }

    async fn update_property(&self, p: &Property) -> StoreResult<()> {
        self.exec(
            "update_property",
            sqlx::query(
                "UPDATE properties SET name = $2, address = $3, city = $4, property_type = $5,
                     description = $6, is_active = $7, updated_at = $8
                 WHERE id = $1",
            )
            .bind(p.id.as_uuid())
            .bind(&p.name)
            .bind(&p.address)
            .bind(&p.city)
            .bind(p.property_type.as_str())
            .bind(&p.description)
            .bind(p.is_active)
            .bind(p.updated_at),
        )
        .await
    }

    async fn delete_property(&self, id: PropertyId) -> StoreResult<()> {
        self.exec(
            "delete_property",
            sqlx::query("DELETE FROM properties WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }

    async fn insert_unit(&self, u: &Unit) -> StoreResult<()> {
        self.exec(
            "insert_unit",
            sqlx::query(
                "INSERT INTO units
                     (id, property_id, organization_id, unit_number, bedrooms, bathrooms, rent_amount, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(u.id.as_uuid())
            .bind(u.property_id.as_uuid())
            .bind(u.organization_id.as_uuid())
            .bind(&u.unit_number)
            .bind(u.bedrooms)
            .bind(u.bathrooms)
            .bind(u.rent_amount)
            .bind(u.status.as_str())
            .bind(u.created_at)
            .bind(u.updated_at),
        )
        .await
    }

    async fn find_unit(&self, id: UnitId) -> StoreResult<Option<Unit>> {
        self.fetch_opt(
            "find_unit",
            sqlx::query("SELECT * FROM units WHERE id = $1").bind(id.as_uuid()),
            decode_unit,
        )
        .await
    }

    async fn list_units(&self, property_id: PropertyId) -> StoreResult<Vec<Unit>> {
        self.fetch_all(
            "list_units",
            sqlx::query("SELECT * FROM units WHERE property_id = $1 ORDER BY unit_number")
                .bind(property_id.as_uuid()),
            decode_unit,
        )
        .await
    }

    async fn list_units_for_organization(&self, organization_id: OrganizationId) -> StoreResult<Vec<Unit>> {
        self.fetch_all(
            "list_units_for_organization",
            sqlx::query("SELECT * FROM units WHERE organization_id = $1")
                .bind(organization_id.as_uuid()),
            decode_unit,
        )
        .await
    }

    async fn update_unit(&self, u: &Unit) -> StoreResult<()> {
        self.exec(
            "update_unit",
            sqlx::query(
                "UPDATE units SET unit_number = $2, bedrooms = $3, bathrooms = $4, rent_amount = $5,
                     status = $6, updated_at = $7
                 WHERE id = $1",
            )
            .bind(u.id.as_uuid())
            .bind(&u.unit_number)
            .bind(u.bedrooms)
            .bind(u.bathrooms)
            .bind(u.rent_amount)
            .bind(u.status.as_str())
            .bind(u.updated_at),
        )
        .await
    }

    async fn delete_unit(&self, id: UnitId) -> StoreResult<()> {
        self.exec(
            "delete_unit",
            sqlx::query("DELETE FROM units WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }
}

#[async_trait]
impl TenancyStore for PgStore {
    async fn insert_tenancy(&self, t: &Tenancy) -> StoreResult<()> {
        self.exec(
            "insert_tenancy",
            sqlx::query(
                "INSERT INTO tenancies
                     (id, organization_id, unit_id, tenant_id, start_date, end_date, rent_amount, deposit_amount, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(t.id.as_uuid())
            .bind(t.organization_id.as_uuid())
            .bind(t.unit_id.as_uuid())
            .bind(t.tenant_id.as_uuid())
            .bind(t.start_date)
            .bind(t.end_date)
            .bind(t.rent_amount)
            .bind(t.deposit_amount)
            .bind(t.status.as_str())
            .bind(t.created_at)
            .bind(t.updated_at),
        )
        .await
    }

    async fn find_tenancy(&self, id: TenancyId) -> StoreResult<Option<Tenancy>> {
        self.fetch_opt(
            "find_tenancy",
            sqlx::query("SELECT * FROM tenancies WHERE id = $1").bind(id.as_uuid()),
            decode_tenancy,
        )
        .await
    }

    async fn list_tenancies(&self, organization_id: OrganizationId) -> StoreResult<Vec<Tenancy>> {
        self.fetch_all(
            "list_tenancies",
            sqlx::query("SELECT * FROM tenancies WHERE organization_id = $1 ORDER BY created_at DESC")
                .bind(organization_id.as_uuid()),
            decode_tenancy,
        )
        .await
    }

    async fn list_tenancies_for_unit(&self, unit_id: UnitId) -> StoreResult<Vec<Tenancy>> {
        self.fetch_all(
            "list_tenancies_for_unit",
            sqlx::query("SELECT * FROM tenancies WHERE unit_id = $1 ORDER BY created_at DESC")
                .bind(unit_id.as_uuid()),
            decode_tenancy,
        )
        .await
    }

    async fn update_tenancy(&self, t: &Tenancy) -> StoreResult<()> {
        self.exec(
            "update_tenancy",
            sqlx::query("UPDATE tenancies SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(t.id.as_uuid())
                .bind(t.status.as_str())
                .bind(t.updated_at),
        )
        .await
    }

    async fn delete_tenancy(&self, id: TenancyId) -> StoreResult<()> {
        self.exec(
            "delete_tenancy",
            sqlx::query("DELETE FROM tenancies WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }
}

#[async_trait]
impl BillingStore for PgStore {
    async fn insert_invoice(&self, i: &Invoice) -> StoreResult<()> {
        self.exec(
            "insert_invoice",
            sqlx::query(
                "INSERT INTO invoices
                     (id, organization_id, tenancy_id, amount, due_date, status, description, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(i.id.as_uuid())
            .bind(i.organization_id.as_uuid())
            .bind(i.tenancy_id.as_uuid())
            .bind(i.amount)
            .bind(i.due_date)
            .bind(i.status.as_str())
            .bind(&i.description)
            .bind(i.created_at)
            .bind(i.updated_at),
        )
        .await
    }

    async fn find_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        self.fetch_opt(
            "find_invoice",
            sqlx::query("SELECT * FROM invoices WHERE id = $1").bind(id.as_uuid()),
            decode_invoice,
        )
        .await
    }

    async fn list_invoices(&self, organization_id: OrganizationId) -> StoreResult<Vec<Invoice>> {
        self.fetch_all(
            "list_invoices",
            sqlx::query("SELECT * FROM invoices WHERE organization_id = $1 ORDER BY created_at DESC")
                .bind(organization_id.as_uuid()),
            decode_invoice,
        )
        .await
    }

    async fn update_invoice(&self, i: &Invoice) -> StoreResult<()> {
        self.exec(
            "update_invoice",
            sqlx::query("UPDATE invoices SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(i.id.as_uuid())
                .bind(i.status.as_str())
                .bind(i.updated_at),
        )
        .await
    }

    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<()> {
        self.exec(
            "delete_invoice",
            sqlx::query("DELETE FROM invoices WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }

    #[instrument(skip_all, fields(payment_id = %p.id, amount = p.amount), err)]
    async fn insert_payment(&self, p: &Payment) -> StoreResult<()> {
        self.exec(
            "insert_payment",
            sqlx::query(
                "INSERT INTO payments
                     (id, organization_id, invoice_id, tenancy_id, guest_id, amount, method, status, reference, created_by, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(p.id.as_uuid())
            .bind(p.organization_id.as_uuid())
            .bind(p.invoice_id.map(|i| i.as_uuid()))
            .bind(p.tenancy_id.map(|t| t.as_uuid()))
            .bind(p.guest_id.map(|g| g.as_uuid()))
            .bind(p.amount)
            .bind(p.method.as_str())
            .bind(p.status.as_str())
            .bind(&p.reference)
            .bind(p.created_by.as_uuid())
            .bind(p.created_at)
            .bind(p.updated_at),
        )
        .await
    }

    async fn find_payment(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        self.fetch_opt(
            "find_payment",
            sqlx::query("SELECT * FROM payments WHERE id = $1").bind(id.as_uuid()),
            decode_payment,
        )
        .await
    }

    async fn list_payments(&self, organization_id: OrganizationId) -> StoreResult<Vec<Payment>> {
        self.fetch_all(
            "list_payments",
            sqlx::query("SELECT * FROM payments WHERE organization_id = $1 ORDER BY created_at DESC")
                .bind(organization_id.as_uuid()),
            decode_payment,
        )
        .await
    }

    async fn list_payments_for_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>> {
        self.fetch_all(
            "list_payments_for_invoice",
            sqlx::query("SELECT * FROM payments WHERE invoice_id = $1 ORDER BY created_at DESC")
                .bind(invoice_id.as_uuid()),
            decode_payment,
        )
        .await
    }

    async fn list_payments_for_guest(&self, guest_id: GuestId) -> StoreResult<Vec<Payment>> {
        self.fetch_all(
            "list_payments_for_guest",
            sqlx::query("SELECT * FROM payments WHERE guest_id = $1 ORDER BY created_at DESC")
                .bind(guest_id.as_uuid()),
            decode_payment,
        )
        .await
    }

    async fn update_payment(&self, p: &Payment) -> StoreResult<()> {
        self.exec(
            "update_payment",
            sqlx::query("UPDATE payments SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(p.id.as_uuid())
                .bind(p.status.as_str())
                .bind(p.updated_at),
        )
        .await
    }

    async fn delete_payment(&self, id: PaymentId) -> StoreResult<()> {
        self.exec(
            "delete_payment",
            sqlx::query("DELETE FROM payments WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }
}

#[async_trait]
impl GuestStore for PgStore {
    async fn insert_guest(&self, g: &Guest) -> StoreResult<()> {
        self.exec(
            "insert_guest",
            sqlx::query(
                "INSERT INTO guests (id, created_by, name, phone, email, id_number, notes, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(g.id.as_uuid())
            .bind(g.created_by.as_uuid())
            .bind(&g.name)
            .bind(g.phone.as_str())
            .bind(g.email.as_ref().map(|e| e.as_str().to_string()))
            .bind(&g.id_number)
            .bind(&g.notes)
            .bind(g.created_at)
            .bind(g.updated_at),
        )
        .await
    }

    async fn find_guest(&self, id: GuestId) -> StoreResult<Option<Guest>> {
        self.fetch_opt(
            "find_guest",
            sqlx::query("SELECT * FROM guests WHERE id = $1").bind(id.as_uuid()),
            decode_guest,
        )
        .await
    }

    async fn list_guests(&self, created_by: UserId) -> StoreResult<Vec<Guest>> {
        self.fetch_all(
            "list_guests",
            sqlx::query("SELECT * FROM guests WHERE created_by = $1 ORDER BY created_at DESC")
                .bind(created_by.as_uuid()),
            decode_guest,
        )
        .await
    }

    async fn update_guest(&self, g: &Guest) -> StoreResult<()> {
        self.exec(
            "update_guest",
            sqlx::query(
                "UPDATE guests SET name = $2, phone = $3, email = $4, id_number = $5, notes = $6, updated_at = $7
                 WHERE id = $1",
            )
            .bind(g.id.as_uuid())
            .bind(&g.name)
            .bind(g.phone.as_str())
            .bind(g.email.as_ref().map(|e| e.as_str().to_string()))
            .bind(&g.id_number)
            .bind(&g.notes)
            .bind(g.updated_at),
        )
        .await
    }

    async fn delete_guest(&self, id: GuestId) -> StoreResult<()> {
        self.exec(
            "delete_guest",
            sqlx::query("DELETE FROM guests WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }

    async fn insert_booking(&self, b: &Booking) -> StoreResult<()> {
        self.exec(
            "insert_booking",
            sqlx::query(
                "INSERT INTO bookings (id, guest_id, created_by, unit_id, check_in, check_out, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(b.id.as_uuid())
            .bind(b.guest_id.as_uuid())
            .bind(b.created_by.as_uuid())
            .bind(b.unit_id.map(|u| u.as_uuid()))
            .bind(b.check_in)
            .bind(b.check_out)
            .bind(b.status.as_str())
            .bind(b.created_at)
            .bind(b.updated_at),
        )
        .await
    }

    async fn find_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.fetch_opt(
            "find_booking",
            sqlx::query("SELECT * FROM bookings WHERE id = $1").bind(id.as_uuid()),
            decode_booking,
        )
        .await
    }

    async fn list_bookings(&self, guest_id: GuestId) -> StoreResult<Vec<Booking>> {
        self.fetch_all(
            "list_bookings",
            sqlx::query("SELECT * FROM bookings WHERE guest_id = $1 ORDER BY check_in DESC")
                .bind(guest_id.as_uuid()),
            decode_booking,
        )
        .await
    }

    async fn list_bookings_for_unit(&self, unit_id: UnitId) -> StoreResult<Vec<Booking>> {
        self.fetch_all(
            "list_bookings_for_unit",
            sqlx::query("SELECT * FROM bookings WHERE unit_id = $1 ORDER BY check_in")
                .bind(unit_id.as_uuid()),
            decode_booking,
        )
        .await
    }

    async fn update_booking(&self, b: &Booking) -> StoreResult<()> {
        self.exec(
            "update_booking",
            sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(b.id.as_uuid())
                .bind(b.status.as_str())
                .bind(b.updated_at),
        )
        .await
    }
}
