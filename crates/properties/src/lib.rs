//! Properties domain module: properties, units and occupancy statistics.
//!
//! This crate contains business rules for the property portfolio,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod property;
pub mod stats;
pub mod unit;

pub use property::{
    NOT_OWNER_MESSAGE, NewPropertyInput, Property, PropertyPatch, PropertyType, UpdatePropertyInput,
    ValidProperty,
};
pub use stats::PropertyStats;
pub use unit::{NewUnitInput, Unit, UnitPatch, UnitStatus, UpdateUnitInput, ValidUnit};
