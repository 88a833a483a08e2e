use chrono::Utc;
use serde::Deserialize;

use miliki_auth::Session;
use miliki_core::{TenancyId, UnitId};
use miliki_leasing::{
    NewTenancyInput, Tenancy, TenancyStatus, ensure_no_overlap, ensure_unit_available,
};
use miliki_properties::UnitStatus;

use crate::access::{AccessError, AccessResult, ActionResult, Done, active_organization, ensure_scope};
use crate::catalog::{
    CREATE_TENANCY, DELETE_TENANCY, GET_TENANCY, LIST_TENANCIES, TagIds, UPDATE_TENANCY_STATUS,
};
use crate::services::AppServices;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TenancyFilter {
    pub unit_id: Option<UnitId>,
}

impl AppServices {
    /// Checks the duration rule, that the unit is leasable and that no
    /// PENDING/ACTIVE tenancy on the unit overlaps the requested dates.
    pub async fn create_tenancy(
        &self,
        session: Option<&Session>,
        input: NewTenancyInput,
    ) -> ActionResult<Tenancy> {
        self.run(session, &CREATE_TENANCY, None, None, |p| async move {
            let unit = self.unit(input.unit_id).await?;
            ensure_scope(&p, &unit)?;
            ensure_unit_available(&unit)?;
            if self.stores.users.find_user(input.tenant_id).await?.is_none() {
                return Err(AccessError::NotFound("Tenant"));
            }
            let valid = input.validate(unit.rent_amount)?;
            let existing = self.stores.tenancies.list_tenancies_for_unit(unit.id).await?;
            ensure_no_overlap(&existing, unit.id, valid.start_date, valid.end_date)?;

            let tenancy = Tenancy::create(unit.organization_id, valid, Utc::now());
            self.stores.tenancies.insert_tenancy(&tenancy).await?;
            tracing::info!(tenancy_id = %tenancy.id, unit_id = %unit.id, "tenancy created");
            Ok(Done::tagged(tenancy, TagIds::default().property(unit.property_id)))
        })
        .await
    }

    pub async fn list_tenancies(
        &self,
        session: Option<&Session>,
        filter: TenancyFilter,
    ) -> ActionResult<Vec<Tenancy>> {
        let args = filter.unit_id.map(|u| u.to_string()).unwrap_or_default();
        self.run(session, &LIST_TENANCIES, None, Some(args), |p| async move {
            let org = active_organization(&p)?;
            let mut tenancies = self.stores.tenancies.list_tenancies(org).await?;
            if let Some(unit_id) = filter.unit_id {
                tenancies.retain(|t| t.unit_id == unit_id);
            }
            Ok(Done::new(tenancies))
        })
        .await
    }

    pub async fn get_tenancy(&self, session: Option<&Session>, id: TenancyId) -> ActionResult<Tenancy> {
        self.run(session, &GET_TENANCY, None, Some(id.to_string()), |p| async move {
            let tenancy = self.tenancy(id).await?;
            ensure_scope(&p, &tenancy)?;
            Ok(Done::new(tenancy))
        })
        .await
    }

    /// Moves the tenancy along its lifecycle and keeps the unit's status in
    /// step: ACTIVE occupies the unit; EXPIRED or CANCELLED frees it unless
    /// another tenancy on the unit is still ACTIVE or RENEWED.
    pub async fn update_tenancy_status(
        &self,
        session: Option<&Session>,
        id: TenancyId,
        status: TenancyStatus,
    ) -> ActionResult<Tenancy> {
        self.run(session, &UPDATE_TENANCY_STATUS, None, None, |p| async move {
            let mut tenancy = self.tenancy(id).await?;
            ensure_scope(&p, &tenancy)?;
            let mut unit = self.unit(tenancy.unit_id).await?;
            if status == TenancyStatus::Active {
                ensure_unit_available(&unit)?;
            }
            let now = Utc::now();
            tenancy.transition(status, now)?;
            self.stores.tenancies.update_tenancy(&tenancy).await?;

            let next_unit_status = match status.unit_status_effect() {
                Some(UnitStatus::Vacant) => {
                    let siblings = self.stores.tenancies.list_tenancies_for_unit(unit.id).await?;
                    let still_occupied = siblings
                        .iter()
                        .any(|t| t.id != tenancy.id && t.status.occupies());
                    (unit.status == UnitStatus::Occupied && !still_occupied)
                        .then_some(UnitStatus::Vacant)
                }
                other => other,
            };
            if let Some(next) = next_unit_status.filter(|s| *s != unit.status) {
                unit.status = next;
                unit.updated_at = now;
                self.stores.properties.update_unit(&unit).await?;
                tracing::info!(unit_id = %unit.id, status = %next, "unit status follows tenancy");
            }
            Ok(Done::tagged(tenancy, TagIds::default().property(unit.property_id)))
        })
        .await
    }

    /// Only PENDING or CANCELLED tenancies can be deleted.
    pub async fn delete_tenancy(&self, session: Option<&Session>, id: TenancyId) -> ActionResult<()> {
        self.run(session, &DELETE_TENANCY, None, None, |p| async move {
            let tenancy = self.tenancy(id).await?;
            ensure_scope(&p, &tenancy)?;
            tenancy.ensure_deletable()?;
            self.stores.tenancies.delete_tenancy(id).await?;
            Ok(Done::new(()))
        })
        .await
    }

    pub(crate) async fn tenancy(&self, id: TenancyId) -> AccessResult<Tenancy> {
        self.stores
            .tenancies
            .find_tenancy(id)
            .await?
            .ok_or(AccessError::NotFound("Tenancy"))
    }
}
