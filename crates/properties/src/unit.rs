use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    DomainError, DomainResult, Entity, FieldErrors, OrganizationId, OrganizationScoped, PropertyId,
    UnitId,
};

/// Upper bound on monthly rent, in minor currency units.
const MAX_RENT: i64 = 100_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Occupied,
    Vacant,
    Maintenance,
}

impl UnitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Occupied => "OCCUPIED",
            UnitStatus::Vacant => "VACANT",
            UnitStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl core::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UnitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OCCUPIED" => Ok(Self::Occupied),
            "VACANT" => Ok(Self::Vacant),
            "MAINTENANCE" => Ok(Self::Maintenance),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown unit status '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub property_id: PropertyId,
    pub organization_id: OrganizationId,
    pub unit_number: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    /// Monthly rent in minor currency units.
    pub rent_amount: i64,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Unit {
    type Id = UnitId;

    fn id(&self) -> &UnitId {
        &self.id
    }
}

impl OrganizationScoped for Unit {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Unit {
    pub fn create(
        organization_id: OrganizationId,
        property_id: PropertyId,
        input: ValidUnit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UnitId::new(),
            property_id,
            organization_id,
            unit_number: input.unit_number,
            bedrooms: input.bedrooms,
            bathrooms: input.bathrooms,
            rent_amount: input.rent_amount,
            status: input.status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: UnitPatch, now: DateTime<Utc>) {
        if let Some(n) = patch.unit_number {
            self.unit_number = n;
        }
        if let Some(b) = patch.bedrooms {
            self.bedrooms = b;
        }
        if let Some(b) = patch.bathrooms {
            self.bathrooms = b;
        }
        if let Some(r) = patch.rent_amount {
            self.rent_amount = r;
        }
        self.updated_at = now;
    }

    /// Manual status changes. Occupancy itself follows tenancy activation, so
    /// a unit can't be marked OCCUPIED by hand, and a unit with a live
    /// tenancy can't be taken out of OCCUPIED.
    pub fn ensure_manual_status_change(
        &self,
        next: UnitStatus,
        has_active_tenancy: bool,
    ) -> DomainResult<()> {
        if next == UnitStatus::Occupied && self.status != UnitStatus::Occupied {
            return Err(DomainError::invariant(
                "Units become OCCUPIED when a tenancy is activated",
            ));
        }
        if has_active_tenancy && next != UnitStatus::Occupied {
            return Err(DomainError::invariant(
                "This unit has an active tenancy; end the tenancy first",
            ));
        }
        Ok(())
    }

    /// Unit numbers are unique within a property (case-insensitive).
    pub fn ensure_unique_number(
        siblings: &[Unit],
        unit_number: &str,
        exclude: Option<UnitId>,
    ) -> DomainResult<()> {
        let clash = siblings.iter().any(|u| {
            Some(u.id) != exclude && u.unit_number.eq_ignore_ascii_case(unit_number)
        });
        if clash {
            return Err(DomainError::conflict(format!(
                "Unit number {unit_number} already exists in this property"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUnitInput {
    pub unit_number: String,
    #[serde(default)]
    pub bedrooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    pub rent_amount: i64,
    #[serde(default)]
    pub status: Option<UnitStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidUnit {
    pub unit_number: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub rent_amount: i64,
    pub status: UnitStatus,
}

impl NewUnitInput {
    pub fn validate(self) -> DomainResult<ValidUnit> {
        let mut errors = FieldErrors::new();
        let unit_number = check_number(&self.unit_number, &mut errors);
        check_rooms("bedrooms", "Bedrooms", self.bedrooms, &mut errors);
        check_rooms("bathrooms", "Bathrooms", self.bathrooms, &mut errors);
        check_rent(self.rent_amount, &mut errors);
        let status = self.status.unwrap_or(UnitStatus::Vacant);
        if status == UnitStatus::Occupied {
            errors.push("status", "New units must start as VACANT or MAINTENANCE");
        }
        errors.into_result()?;
        Ok(ValidUnit {
            unit_number,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            rent_amount: self.rent_amount,
            status,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUnitInput {
    pub unit_number: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub rent_amount: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitPatch {
    pub unit_number: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub rent_amount: Option<i64>,
}

impl UpdateUnitInput {
    pub fn validate(self) -> DomainResult<UnitPatch> {
        let mut errors = FieldErrors::new();
        let unit_number = self
            .unit_number
            .map(|n| check_number(&n, &mut errors));
        if let Some(b) = self.bedrooms {
            check_rooms("bedrooms", "Bedrooms", b, &mut errors);
        }
        if let Some(b) = self.bathrooms {
            check_rooms("bathrooms", "Bathrooms", b, &mut errors);
        }
        if let Some(r) = self.rent_amount {
            check_rent(r, &mut errors);
        }
        errors.into_result()?;
        Ok(UnitPatch {
            unit_number,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            rent_amount: self.rent_amount,
        })
    }
}

fn check_number(raw: &str, errors: &mut FieldErrors) -> String {
    let n = raw.trim().to_string();
    if n.is_empty() {
        errors.push("unit_number", "Unit number is required");
    } else if n.chars().count() > 20 {
        errors.push("unit_number", "Unit number must be at most 20 characters");
    }
    n
}

fn check_rooms(field: &'static str, label: &str, n: i32, errors: &mut FieldErrors) {
    if !(0..=50).contains(&n) {
        errors.push(field, format!("{label} must be between 0 and 50"));
    }
}

fn check_rent(amount: i64, errors: &mut FieldErrors) {
    if amount <= 0 {
        errors.push("rent_amount", "Rent must be greater than zero");
    } else if amount > MAX_RENT {
        errors.push("rent_amount", "Rent is too large");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(status: UnitStatus) -> Unit {
        let input = NewUnitInput {
            unit_number: " B2 ".into(),
            bedrooms: 2,
            bathrooms: 1,
            rent_amount: 30_000_00,
            status: None,
        }
        .validate()
        .unwrap();
        let mut u = Unit::create(OrganizationId::new(), PropertyId::new(), input, Utc::now());
        u.status = status;
        u
    }

    #[test]
    fn new_units_default_to_vacant() {
        let u = unit(UnitStatus::Vacant);
        assert_eq!(u.unit_number, "B2");
        assert_eq!(u.status, UnitStatus::Vacant);
    }

    #[test]
    fn rent_must_be_positive() {
        let err = NewUnitInput {
            unit_number: "1".into(),
            bedrooms: 0,
            bathrooms: 0,
            rent_amount: 0,
            status: None,
        }
        .validate()
        .unwrap_err();
        let DomainError::Validation(f) = err else { panic!() };
        assert_eq!(f.message_for("rent_amount"), Some("Rent must be greater than zero"));
    }

    #[test]
    fn cannot_create_occupied_unit() {
        assert!(
            NewUnitInput {
                unit_number: "1".into(),
                bedrooms: 1,
                bathrooms: 1,
                rent_amount: 100,
                status: Some(UnitStatus::Occupied),
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn unit_numbers_are_unique_case_insensitively() {
        let a = unit(UnitStatus::Vacant);
        assert!(Unit::ensure_unique_number(std::slice::from_ref(&a), "b2", None).is_err());
        assert!(Unit::ensure_unique_number(std::slice::from_ref(&a), "b2", Some(a.id)).is_ok());
        assert!(Unit::ensure_unique_number(&[a], "B3", None).is_ok());
    }

    #[test]
    fn manual_status_rules() {
        let vacant = unit(UnitStatus::Vacant);
        assert!(vacant.ensure_manual_status_change(UnitStatus::Maintenance, false).is_ok());
        assert!(vacant.ensure_manual_status_change(UnitStatus::Occupied, false).is_err());

        let occupied = unit(UnitStatus::Occupied);
        assert!(occupied.ensure_manual_status_change(UnitStatus::Vacant, true).is_err());
        assert!(occupied.ensure_manual_status_change(UnitStatus::Vacant, false).is_ok());
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(serde_json::to_string(&UnitStatus::Maintenance).unwrap(), "\"MAINTENANCE\"");
        assert_eq!("VACANT".parse::<UnitStatus>().unwrap(), UnitStatus::Vacant);
    }
}
