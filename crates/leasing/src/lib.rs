//! Leasing domain module: tenancies and their lifecycle.

pub mod tenancy;

pub use tenancy::{
    MAX_TENANCY_DAYS, MIN_TENANCY_DAYS, NewTenancyInput, Tenancy, TenancyStatus, ValidTenancy,
    check_duration, ensure_no_overlap, ensure_unit_available,
};
