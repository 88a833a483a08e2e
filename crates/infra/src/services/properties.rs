//! Properties, units and occupancy statistics.

use chrono::Utc;

use miliki_auth::Session;
use miliki_core::{OrganizationId, Owned, PropertyId, UnitId};
use miliki_properties::{
    NOT_OWNER_MESSAGE, NewPropertyInput, NewUnitInput, Property, PropertyStats, Unit, UnitStatus,
    UpdatePropertyInput, UpdateUnitInput,
};

use crate::access::{
    AccessError, AccessResult, ActionResult, Done, active_organization,
    ensure_active_organization, ensure_scope,
};
use crate::catalog::{
    CREATE_PROPERTY, CREATE_UNIT, DELETE_PROPERTY, DELETE_UNIT, GET_PROPERTY, GET_UNIT,
    LIST_PROPERTIES, LIST_UNITS, PROPERTY_STATS, TagIds, UPDATE_PROPERTY, UPDATE_UNIT,
    UPDATE_UNIT_STATUS,
};
use crate::services::AppServices;

impl AppServices {
    /// The acting user becomes the property's owner.
    pub async fn create_property(
        &self,
        session: Option<&Session>,
        input: NewPropertyInput,
    ) -> ActionResult<Property> {
        self.run(session, &CREATE_PROPERTY, None, None, |p| async move {
            let org = active_organization(&p)?;
            let property = Property::create(org, p.user_id, input.validate()?, Utc::now());
            self.stores.properties.insert_property(&property).await?;
            tracing::info!(property_id = %property.id, organization_id = %org, "property created");
            let ids = TagIds::default().property(property.id);
            Ok(Done::tagged(property, ids))
        })
        .await
    }

    /// Properties of the organization named by `slug`, which must be the
    /// active one.
    pub async fn list_properties(
        &self,
        session: Option<&Session>,
        slug: &str,
    ) -> ActionResult<Vec<Property>> {
        self.run(session, &LIST_PROPERTIES, None, Some(slug.to_string()), |p| async move {
            let org = self.organization_by_slug(slug).await?;
            ensure_active_organization(&p, org.id)?;
            Ok(Done::new(self.stores.properties.list_properties(org.id).await?))
        })
        .await
    }

    pub async fn get_property(&self, session: Option<&Session>, id: PropertyId) -> ActionResult<Property> {
        self.run(session, &GET_PROPERTY, None, Some(id.to_string()), |p| async move {
            let property = self.property(id).await?;
            ensure_scope(&p, &property)?;
            Ok(Done::tagged(property, TagIds::default().property(id)))
        })
        .await
    }

    pub async fn update_property(
        &self,
        session: Option<&Session>,
        id: PropertyId,
        input: UpdatePropertyInput,
    ) -> ActionResult<Property> {
        self.run(session, &UPDATE_PROPERTY, None, None, |p| async move {
            let mut property = self.property(id).await?;
            ensure_scope(&p, &property)?;
            property.apply(input.validate()?, Utc::now());
            self.stores.properties.update_property(&property).await?;
            Ok(Done::tagged(property, TagIds::default().property(id)))
        })
        .await
    }

    /// Only the property's owner may delete it, and only while none of its
    /// units is occupied or has a live tenancy. Past tenancies go with it.
    pub async fn delete_property(&self, session: Option<&Session>, id: PropertyId) -> ActionResult<()> {
        self.run(session, &DELETE_PROPERTY, None, None, |p| async move {
            let property = self.property(id).await?;
            ensure_scope(&p, &property)?;
            if !property.is_owned_by(p.user_id) {
                return Err(AccessError::Forbidden(NOT_OWNER_MESSAGE.to_string()));
            }
            let units = self.stores.properties.list_units(id).await?;
            property.ensure_deletable(&units)?;
            let unit_ids: Vec<UnitId> = units.iter().map(|u| u.id).collect();
            self.clear_tenancy_history(property.organization_id, &unit_ids, "property")
                .await?;
            self.stores.properties.delete_property(id).await?;
            tracing::info!(property_id = %id, "property deleted");
            Ok(Done::tagged((), TagIds::default().property(id)))
        })
        .await
    }

    pub async fn property_stats(&self, session: Option<&Session>) -> ActionResult<PropertyStats> {
        self.run(session, &PROPERTY_STATS, None, Some(String::new()), |p| async move {
            let org = active_organization(&p)?;
            let properties = self.stores.properties.list_properties(org).await?;
            let units = self.stores.properties.list_units_for_organization(org).await?;
            Ok(Done::new(PropertyStats::compute(&properties, &units)))
        })
        .await
    }

    pub async fn create_unit(
        &self,
        session: Option<&Session>,
        property_id: PropertyId,
        input: NewUnitInput,
    ) -> ActionResult<Unit> {
        self.run(session, &CREATE_UNIT, None, None, |p| async move {
            let property = self.property(property_id).await?;
            ensure_scope(&p, &property)?;
            let valid = input.validate()?;
            let siblings = self.stores.properties.list_units(property_id).await?;
            Unit::ensure_unique_number(&siblings, &valid.unit_number, None)?;

            let unit = Unit::create(property.organization_id, property_id, valid, Utc::now());
            self.stores.properties.insert_unit(&unit).await?;
            Ok(Done::tagged(unit, TagIds::default().property(property_id)))
        })
        .await
    }

    pub async fn list_units(
        &self,
        session: Option<&Session>,
        property_id: PropertyId,
    ) -> ActionResult<Vec<Unit>> {
        self.run(session, &LIST_UNITS, None, Some(property_id.to_string()), |p| async move {
            let property = self.property(property_id).await?;
            ensure_scope(&p, &property)?;
            let units = self.stores.properties.list_units(property_id).await?;
            Ok(Done::tagged(units, TagIds::default().property(property_id)))
        })
        .await
    }

    pub async fn get_unit(&self, session: Option<&Session>, id: UnitId) -> ActionResult<Unit> {
        self.run(session, &GET_UNIT, None, Some(id.to_string()), |p| async move {
            let unit = self.unit(id).await?;
            ensure_scope(&p, &unit)?;
            let ids = TagIds::default().property(unit.property_id);
            Ok(Done::tagged(unit, ids))
        })
        .await
    }

    pub async fn update_unit(
        &self,
        session: Option<&Session>,
        id: UnitId,
        input: UpdateUnitInput,
    ) -> ActionResult<Unit> {
        self.run(session, &UPDATE_UNIT, None, None, |p| async move {
            let mut unit = self.unit(id).await?;
            ensure_scope(&p, &unit)?;
            let patch = input.validate()?;
            if let Some(number) = &patch.unit_number {
                let siblings = self.stores.properties.list_units(unit.property_id).await?;
                Unit::ensure_unique_number(&siblings, number, Some(id))?;
            }
            unit.apply(patch, Utc::now());
            self.stores.properties.update_unit(&unit).await?;
            let ids = TagIds::default().property(unit.property_id);
            Ok(Done::tagged(unit, ids))
        })
        .await
    }

    /// Manual status changes (VACANT ⇄ MAINTENANCE). Occupancy follows
    /// tenancies.
    pub async fn update_unit_status(
        &self,
        session: Option<&Session>,
        id: UnitId,
        status: UnitStatus,
    ) -> ActionResult<Unit> {
        self.run(session, &UPDATE_UNIT_STATUS, None, None, |p| async move {
            let mut unit = self.unit(id).await?;
            ensure_scope(&p, &unit)?;
            let tenancies = self.stores.tenancies.list_tenancies_for_unit(id).await?;
            let has_active = tenancies.iter().any(|t| t.status.occupies());
            unit.ensure_manual_status_change(status, has_active)?;
            if unit.status != status {
                unit.status = status;
                unit.updated_at = Utc::now();
                self.stores.properties.update_unit(&unit).await?;
            }
            let ids = TagIds::default().property(unit.property_id);
            Ok(Done::tagged(unit, ids))
        })
        .await
    }

    /// Blocked while a PENDING, ACTIVE or RENEWED tenancy references the
    /// unit. Expired and cancelled tenancies are removed with it.
    pub async fn delete_unit(&self, session: Option<&Session>, id: UnitId) -> ActionResult<()> {
        self.run(session, &DELETE_UNIT, None, None, |p| async move {
            let unit = self.unit(id).await?;
            ensure_scope(&p, &unit)?;
            self.clear_tenancy_history(unit.organization_id, &[id], "unit").await?;
            self.stores.properties.delete_unit(id).await?;
            Ok(Done::tagged((), TagIds::default().property(unit.property_id)))
        })
        .await
    }

    /// Deletes the ended tenancies of `unit_ids`. Live tenancies block, and
    /// so do ended ones that were invoiced: billing history is kept.
    async fn clear_tenancy_history(
        &self,
        organization_id: OrganizationId,
        unit_ids: &[UnitId],
        what: &str,
    ) -> AccessResult<()> {
        let mut history = Vec::new();
        for &unit_id in unit_ids {
            history.extend(self.stores.tenancies.list_tenancies_for_unit(unit_id).await?);
        }
        let live = history.iter().filter(|t| t.status.is_live()).count();
        if live > 0 {
            return Err(AccessError::conflict(format!(
                "Cannot delete a {what} with a pending, active or renewed tenancy ({live} found)"
            )));
        }
        if history.is_empty() {
            return Ok(());
        }
        let invoices = self.stores.billing.list_invoices(organization_id).await?;
        let invoiced = history
            .iter()
            .filter(|t| invoices.iter().any(|i| i.tenancy_id == t.id))
            .count();
        if invoiced > 0 {
            return Err(AccessError::conflict(format!(
                "Cannot delete a {what} whose past tenancies have invoices ({invoiced} invoiced); \
                 delete those invoices first"
            )));
        }
        for tenancy in &history {
            self.stores.tenancies.delete_tenancy(tenancy.id).await?;
        }
        tracing::info!(count = history.len(), "past tenancies removed");
        Ok(())
    }

    pub(crate) async fn property(&self, id: PropertyId) -> AccessResult<Property> {
        self.stores
            .properties
            .find_property(id)
            .await?
            .ok_or(AccessError::NotFound("Property"))
    }

    pub(crate) async fn unit(&self, id: UnitId) -> AccessResult<Unit> {
        self.stores
            .properties
            .find_unit(id)
            .await?
            .ok_or(AccessError::NotFound("Unit"))
    }
}
