//! Tenancies: time-bounded occupancy agreements between a tenant and a unit.
//!
//! Status lifecycle:
//!
//! ```text
//! PENDING -> ACTIVE | CANCELLED
//! ACTIVE  -> EXPIRED | CANCELLED | RENEWED
//! RENEWED -> EXPIRED
//! ```
//!
//! EXPIRED and CANCELLED are terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    DomainError, DomainResult, Entity, FieldErrors, OrganizationId, OrganizationScoped, TenancyId,
    UnitId, UserId,
};
use miliki_properties::{Unit, UnitStatus};

pub const MIN_TENANCY_DAYS: i64 = 28;
pub const MAX_TENANCY_DAYS: i64 = 730;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenancyStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    Renewed,
}

impl TenancyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TenancyStatus::Pending => "PENDING",
            TenancyStatus::Active => "ACTIVE",
            TenancyStatus::Expired => "EXPIRED",
            TenancyStatus::Cancelled => "CANCELLED",
            TenancyStatus::Renewed => "RENEWED",
        }
    }

    pub fn can_transition_to(self, next: TenancyStatus) -> bool {
        use TenancyStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Expired)
                | (Active, Cancelled)
                | (Active, Renewed)
                | (Renewed, Expired)
        )
    }

    /// Tenancies that hold a claim on their unit's calendar.
    pub fn is_live(self) -> bool {
        self == TenancyStatus::Pending || self.occupies()
    }

    /// Tenancies whose tenant is in the unit. A renewed tenancy keeps the
    /// unit OCCUPIED until it expires.
    pub fn occupies(self) -> bool {
        matches!(self, TenancyStatus::Active | TenancyStatus::Renewed)
    }

    /// What happens to the unit when a tenancy enters this status.
    pub fn unit_status_effect(self) -> Option<UnitStatus> {
        match self {
            TenancyStatus::Active => Some(UnitStatus::Occupied),
            TenancyStatus::Expired | TenancyStatus::Cancelled => Some(UnitStatus::Vacant),
            TenancyStatus::Pending | TenancyStatus::Renewed => None,
        }
    }
}

impl core::fmt::Display for TenancyStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TenancyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" => Ok(Self::Cancelled),
            "RENEWED" => Ok(Self::Renewed),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown tenancy status '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenancy {
    pub id: TenancyId,
    pub organization_id: OrganizationId,
    pub unit_id: UnitId,
    pub tenant_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent_amount: i64,
    pub deposit_amount: i64,
    pub status: TenancyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Tenancy {
    type Id = TenancyId;

    fn id(&self) -> &TenancyId {
        &self.id
    }
}

impl OrganizationScoped for Tenancy {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Tenancy {
    pub fn create(organization_id: OrganizationId, input: ValidTenancy, now: DateTime<Utc>) -> Self {
        Self {
            id: TenancyId::new(),
            organization_id,
            unit_id: input.unit_id,
            tenant_id: input.tenant_id,
            start_date: input.start_date,
            end_date: input.end_date,
            rent_amount: input.rent_amount,
            deposit_amount: input.deposit_amount,
            status: TenancyStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Half-open interval overlap on `[start, end)`.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date < end && start < self.end_date
    }

    pub fn transition(&mut self, next: TenancyStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "Cannot change a {} tenancy to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> DomainResult<()> {
        match self.status {
            TenancyStatus::Pending | TenancyStatus::Cancelled => Ok(()),
            other => Err(DomainError::invariant(format!(
                "Only PENDING or CANCELLED tenancies can be deleted (this one is {other})"
            ))),
        }
    }
}

/// Duration rule shared by creation and any date edits.
pub fn check_duration(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    let days = (end - start).num_days();
    if days <= 0 {
        return Err("End date must be after start date");
    }
    if days < MIN_TENANCY_DAYS {
        return Err("Tenancy must last at least 28 days");
    }
    if days > MAX_TENANCY_DAYS {
        return Err("Tenancy cannot exceed 730 days");
    }
    Ok(())
}

pub fn ensure_unit_available(unit: &Unit) -> DomainResult<()> {
    if unit.status == UnitStatus::Maintenance {
        return Err(DomainError::invariant(
            "This unit is under maintenance and cannot be leased",
        ));
    }
    Ok(())
}

/// No two live tenancies may share any day on the same unit.
pub fn ensure_no_overlap(
    existing: &[Tenancy],
    unit_id: UnitId,
    start: NaiveDate,
    end: NaiveDate,
) -> DomainResult<()> {
    let clash = existing
        .iter()
        .filter(|t| t.unit_id == unit_id && t.status.is_live())
        .find(|t| t.overlaps(start, end));
    if let Some(t) = clash {
        return Err(DomainError::conflict(format!(
            "This unit already has a {} tenancy from {} to {}",
            t.status, t.start_date, t.end_date
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTenancyInput {
    pub unit_id: UnitId,
    pub tenant_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Defaults to the unit's rent.
    #[serde(default)]
    pub rent_amount: Option<i64>,
    #[serde(default)]
    pub deposit_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTenancy {
    pub unit_id: UnitId,
    pub tenant_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent_amount: i64,
    pub deposit_amount: i64,
}

impl NewTenancyInput {
    pub fn validate(self, unit_rent: i64) -> DomainResult<ValidTenancy> {
        let mut errors = FieldErrors::new();
        if let Err(msg) = check_duration(self.start_date, self.end_date) {
            errors.push("end_date", msg);
        }
        let rent_amount = self.rent_amount.unwrap_or(unit_rent);
        if rent_amount <= 0 {
            errors.push("rent_amount", "Rent must be greater than zero");
        }
        if self.deposit_amount < 0 {
            errors.push("deposit_amount", "Deposit cannot be negative");
        }
        errors.into_result()?;
        Ok(ValidTenancy {
            unit_id: self.unit_id,
            tenant_id: self.tenant_id,
            start_date: self.start_date,
            end_date: self.end_date,
            rent_amount,
            deposit_amount: self.deposit_amount,
        })
    }
}
