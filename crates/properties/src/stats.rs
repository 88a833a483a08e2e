//! Portfolio statistics for an organization.

use serde::Serialize;

use crate::{Property, Unit, UnitStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyStats {
    pub total_properties: usize,
    pub active_properties: usize,
    pub total_units: usize,
    pub occupied_units: usize,
    pub vacant_units: usize,
    pub maintenance_units: usize,
    /// Percentage of units occupied, rounded to one decimal place.
    pub occupancy_rate: f64,
    /// Sum of rent over occupied units.
    pub monthly_rent_roll: i64,
    /// Sum of rent over all units.
    pub potential_rent: i64,
}

impl PropertyStats {
    pub fn compute(properties: &[Property], units: &[Unit]) -> Self {
        let count = |s: UnitStatus| units.iter().filter(|u| u.status == s).count();
        let occupied_units = count(UnitStatus::Occupied);
        let total_units = units.len();
        let occupancy_rate = if total_units == 0 {
            0.0
        } else {
            (occupied_units as f64 * 1000.0 / total_units as f64).round() / 10.0
        };
        Self {
            total_properties: properties.len(),
            active_properties: properties.iter().filter(|p| p.is_active).count(),
            total_units,
            occupied_units,
            vacant_units: count(UnitStatus::Vacant),
            maintenance_units: count(UnitStatus::Maintenance),
            occupancy_rate,
            monthly_rent_roll: units
                .iter()
                .filter(|u| u.status == UnitStatus::Occupied)
                .map(|u| u.rent_amount)
                .sum(),
            potential_rent: units.iter().map(|u| u.rent_amount).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use miliki_core::{OrganizationId, PropertyId, UnitId};
    use proptest::prelude::*;

    fn unit(status: UnitStatus, rent: i64) -> Unit {
        let now = Utc::now();
        Unit {
            id: UnitId::new(),
            property_id: PropertyId::new(),
            organization_id: OrganizationId::new(),
            unit_number: "1".into(),
            bedrooms: 1,
            bathrooms: 1,
            rent_amount: rent,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_portfolio() {
        let s = PropertyStats::compute(&[], &[]);
        assert_eq!(s.total_units, 0);
        assert_eq!(s.occupancy_rate, 0.0);
    }

    #[test]
    fn rates_and_rent_roll() {
        let units = [
            unit(UnitStatus::Occupied, 100),
            unit(UnitStatus::Vacant, 200),
            unit(UnitStatus::Maintenance, 300),
        ];
        let s = PropertyStats::compute(&[], &units);
        assert_eq!(s.occupancy_rate, 33.3);
        assert_eq!(s.monthly_rent_roll, 100);
        assert_eq!(s.potential_rent, 600);
    }

    proptest! {
        #[test]
        fn status_counts_partition_units(statuses in prop::collection::vec(0u8..3, 0..40)) {
            let units: Vec<Unit> = statuses
                .iter()
                .map(|s| match s {
                    0 => unit(UnitStatus::Occupied, 10),
                    1 => unit(UnitStatus::Vacant, 10),
                    _ => unit(UnitStatus::Maintenance, 10),
                })
                .collect();
            let s = PropertyStats::compute(&[], &units);
            prop_assert_eq!(s.occupied_units + s.vacant_units + s.maintenance_units, s.total_units);
            prop_assert!((0.0..=100.0).contains(&s.occupancy_rate));
            prop_assert!(s.monthly_rent_roll <= s.potential_rent);
        }
    }
}
