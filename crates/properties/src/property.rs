use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    DomainError, DomainResult, Entity, FieldErrors, OrganizationId, OrganizationScoped, Owned,
    PropertyId, UserId,
};

use crate::{Unit, UnitStatus};

pub const NOT_OWNER_MESSAGE: &str = "You are not the owner of this property";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Apartment,
    House,
    Commercial,
    MixedUse,
    Other,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Apartment => "APARTMENT",
            PropertyType::House => "HOUSE",
            PropertyType::Commercial => "COMMERCIAL",
            PropertyType::MixedUse => "MIXED_USE",
            PropertyType::Other => "OTHER",
        }
    }
}

impl core::str::FromStr for PropertyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APARTMENT" => Ok(Self::Apartment),
            "HOUSE" => Ok(Self::House),
            "COMMERCIAL" => Ok(Self::Commercial),
            "MIXED_USE" => Ok(Self::MixedUse),
            "OTHER" => Ok(Self::Other),
            other => Err(DomainError::validation(
                "property_type",
                format!("Unknown property type '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub organization_id: OrganizationId,
    /// The user who created the property; only they may delete it.
    pub owner_id: UserId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub property_type: PropertyType,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Property {
    type Id = PropertyId;

    fn id(&self) -> &PropertyId {
        &self.id
    }
}

impl OrganizationScoped for Property {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Owned for Property {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

impl Property {
    pub fn create(
        organization_id: OrganizationId,
        owner_id: UserId,
        input: ValidProperty,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PropertyId::new(),
            organization_id,
            owner_id,
            name: input.name,
            address: input.address,
            city: input.city,
            property_type: input.property_type,
            description: input.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: PropertyPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
        if let Some(t) = patch.property_type {
            self.property_type = t;
        }
        if let Some(d) = patch.description {
            self.description = d;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
    }

    /// Properties with occupied units cannot be removed.
    pub fn ensure_deletable(&self, units: &[Unit]) -> DomainResult<()> {
        let occupied = units
            .iter()
            .filter(|u| u.property_id == self.id && u.status == UnitStatus::Occupied)
            .count();
        if occupied > 0 {
            return Err(DomainError::conflict(format!(
                "Cannot delete a property with occupied units ({occupied} occupied)"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPropertyInput {
    pub name: String,
    pub address: String,
    pub city: String,
    pub property_type: PropertyType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProperty {
    pub name: String,
    pub address: String,
    pub city: String,
    pub property_type: PropertyType,
    pub description: Option<String>,
}

impl NewPropertyInput {
    pub fn validate(self) -> DomainResult<ValidProperty> {
        let mut errors = FieldErrors::new();
        let name = required(&self.name, "name", "Property name", 120, &mut errors);
        let address = required(&self.address, "address", "Address", 200, &mut errors);
        let city = required(&self.city, "city", "City", 80, &mut errors);
        let description = optional_text(self.description, 2000, &mut errors);
        errors.into_result()?;
        Ok(ValidProperty {
            name,
            address,
            city,
            property_type: self.property_type,
            description,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePropertyInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl UpdatePropertyInput {
    pub fn validate(self) -> DomainResult<PropertyPatch> {
        let mut errors = FieldErrors::new();
        let name = self
            .name
            .map(|v| required(&v, "name", "Property name", 120, &mut errors));
        let address = self
            .address
            .map(|v| required(&v, "address", "Address", 200, &mut errors));
        let city = self.city.map(|v| required(&v, "city", "City", 80, &mut errors));
        let description = self
            .description
            .map(|d| optional_text(Some(d), 2000, &mut errors));
        errors.into_result()?;
        Ok(PropertyPatch {
            name,
            address,
            city,
            property_type: self.property_type,
            description,
            is_active: self.is_active,
        })
    }
}

fn required(raw: &str, field: &'static str, label: &str, max: usize, errors: &mut FieldErrors) -> String {
    let v = raw.trim().to_string();
    if v.is_empty() {
        errors.push(field, format!("{label} is required"));
    } else if v.chars().count() > max {
        errors.push(field, format!("{label} must be at most {max} characters"));
    }
    v
}

fn optional_text(raw: Option<String>, max: usize, errors: &mut FieldErrors) -> Option<String> {
    let v = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
    if v.chars().count() > max {
        errors.push("description", format!("Description must be at most {max} characters"));
    }
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use miliki_core::UnitId;

    fn input() -> NewPropertyInput {
        NewPropertyInput {
            name: "  Riverside Court ".into(),
            address: "12 River Rd".into(),
            city: "Nairobi".into(),
            property_type: PropertyType::Apartment,
            description: Some("   ".into()),
        }
    }

    #[test]
    fn validation_trims_and_drops_blank_description() {
        let v = input().validate().unwrap();
        assert_eq!(v.name, "Riverside Court");
        assert_eq!(v.description, None);
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let err = NewPropertyInput {
            name: "".into(),
            address: " ".into(),
            ..input()
        }
        .validate()
        .unwrap_err();
        let DomainError::Validation(fields) = err else { panic!() };
        assert_eq!(fields.message_for("name"), Some("Property name is required"));
        assert_eq!(fields.message_for("address"), Some("Address is required"));
        assert!(fields.message_for("city").is_none());
    }

    #[test]
    fn ownership() {
        let owner = UserId::new();
        let p = Property::create(OrganizationId::new(), owner, input().validate().unwrap(), Utc::now());
        assert!(p.is_owned_by(owner));
        assert!(!p.is_owned_by(UserId::new()));
    }

    #[test]
    fn occupied_units_block_deletion() {
        let now = Utc::now();
        let p = Property::create(OrganizationId::new(), UserId::new(), input().validate().unwrap(), now);
        let mut unit = Unit {
            id: UnitId::new(),
            property_id: p.id,
            organization_id: p.organization_id,
            unit_number: "A1".into(),
            bedrooms: 2,
            bathrooms: 1,
            rent_amount: 25_000_00,
            status: UnitStatus::Vacant,
            created_at: now,
            updated_at: now,
        };
        assert!(p.ensure_deletable(std::slice::from_ref(&unit)).is_ok());
        unit.status = UnitStatus::Occupied;
        assert!(p.ensure_deletable(&[unit]).is_err());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let now = Utc::now();
        let mut p = Property::create(OrganizationId::new(), UserId::new(), input().validate().unwrap(), now);
        let patch = UpdatePropertyInput {
            city: Some("Mombasa".into()),
            is_active: Some(false),
            ..Default::default()
        }
        .validate()
        .unwrap();
        p.apply(patch, now);
        assert_eq!(p.city, "Mombasa");
        assert_eq!(p.name, "Riverside Court");
        assert!(!p.is_active);
    }
}
