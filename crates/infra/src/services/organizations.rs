//! Organizations, memberships and invitations.

use chrono::Utc;

use miliki_auth::{Role, Session};
use miliki_core::{InvitationId, OrganizationId, UserId};
use miliki_organizations::{
    Invitation, InvitationStatus, Membership, NewInvitationInput, NewOrganizationInput,
    Organization, UpdateOrganizationInput, ensure_can_grant, ensure_owner_remains,
};

use crate::access::{
    AccessError, AccessResult, ActionResult, Done, active_organization,
    ensure_active_organization, ensure_scope,
};
use crate::catalog::{
    ACCEPT_INVITATION, CANCEL_INVITATION, CREATE_INVITATION, CREATE_ORGANIZATION,
    DELETE_ORGANIZATION, GET_ORGANIZATION, LIST_INVITATIONS, LIST_MEMBERS, LIST_MY_ORGANIZATIONS,
    REMOVE_MEMBER, SET_ACTIVE_ORGANIZATION, TagIds, TagKind, UPDATE_MEMBER_ROLE,
    UPDATE_ORGANIZATION,
};
use crate::email::invitation_email;
use crate::services::AppServices;
use crate::store::{MemberDetail, OrganizationSummary};

impl AppServices {
    /// The creator becomes the owner and the organization becomes active.
    pub async fn create_organization(
        &self,
        session: Option<&Session>,
        input: NewOrganizationInput,
    ) -> ActionResult<Organization> {
        let session_id = session.map(|s| s.id);
        self.run(session, &CREATE_ORGANIZATION, None, None, |p| async move {
            let (name, slug) = input.validate()?;
            let now = Utc::now();
            let org = Organization {
                id: OrganizationId::new(),
                name,
                slug,
                created_by: p.user_id,
                created_at: now,
                updated_at: now,
            };
            let founder = Membership {
                organization_id: org.id,
                user_id: p.user_id,
                role: Role::Owner,
                created_at: now,
            };
            self.stores.organizations.insert_organization(&org, &founder).await?;
            if let Some(id) = session_id {
                self.stores.sessions.set_active_organization(id, Some(org.id)).await?;
            }
            let ids = TagIds::default().organization(org.id);
            Ok(Done::tagged(org, ids))
        })
        .await
    }

    pub async fn list_my_organizations(
        &self,
        session: Option<&Session>,
    ) -> ActionResult<Vec<OrganizationSummary>> {
        self.run(session, &LIST_MY_ORGANIZATIONS, None, Some(String::new()), |p| async move {
            let orgs = self.stores.organizations.list_organizations_for_user(p.user_id).await?;
            Ok(Done::new(orgs))
        })
        .await
    }

    pub async fn get_organization(
        &self,
        session: Option<&Session>,
        slug: &str,
    ) -> ActionResult<Organization> {
        self.run(session, &GET_ORGANIZATION, None, Some(slug.to_string()), |p| async move {
            let org = self.organization_by_slug(slug).await?;
            ensure_active_organization(&p, org.id)?;
            Ok(Done::new(org))
        })
        .await
    }

    pub async fn update_organization(
        &self,
        session: Option<&Session>,
        id: OrganizationId,
        input: UpdateOrganizationInput,
    ) -> ActionResult<Organization> {
        self.run(session, &UPDATE_ORGANIZATION, Some(id), None, |_| async move {
            let mut org = self
                .stores
                .organizations
                .find_organization(id)
                .await?
                .ok_or(AccessError::NotFound("Organization"))?;
            if let Some(name) = input.validate()? {
                org.name = name;
                org.updated_at = Utc::now();
                self.stores.organizations.update_organization(&org).await?;
            }
            let members = self.stores.organizations.list_members(id).await?;
            self.invalidate_for_users(
                TagKind::OrganizationsByUser,
                members.iter().map(|m| m.membership.user_id),
            );
            Ok(Done::new(org))
        })
        .await
    }

    /// Blocked while the organization still owns properties.
    pub async fn delete_organization(
        &self,
        session: Option<&Session>,
        id: OrganizationId,
    ) -> ActionResult<()> {
        self.run(session, &DELETE_ORGANIZATION, Some(id), None, |_| async move {
            if self.stores.organizations.find_organization(id).await?.is_none() {
                return Err(AccessError::NotFound("Organization"));
            }
            let properties = self.stores.properties.list_properties(id).await?;
            if !properties.is_empty() {
                return Err(AccessError::conflict(format!(
                    "Cannot delete an organization that still has properties ({} remaining)",
                    properties.len()
                )));
            }
            let members = self.stores.organizations.list_members(id).await?;
            self.stores.organizations.delete_organization(id).await?;
            self.invalidate_for_users(
                TagKind::OrganizationsByUser,
                members.iter().map(|m| m.membership.user_id),
            );
            tracing::info!(organization_id = %id, "organization deleted");
            Ok(Done::new(()))
        })
        .await
    }

    /// Switch the session's active organization (`None` clears it). The
    /// user must be a member unless they are a platform admin.
    pub async fn set_active_organization(
        &self,
        session: Option<&Session>,
        organization_id: Option<OrganizationId>,
    ) -> ActionResult<Option<Organization>> {
        let session_id = session.map(|s| s.id);
        self.run(session, &SET_ACTIVE_ORGANIZATION, None, None, |p| async move {
            let org = match organization_id {
                Some(id) => {
                    let org = self
                        .stores
                        .organizations
                        .find_organization(id)
                        .await?
                        .ok_or(AccessError::NotFound("Organization"))?;
                    let member = self.stores.organizations.find_membership(id, p.user_id).await?;
                    if member.is_none() && !self.is_platform_admin(p.user_id).await? {
                        return Err(AccessError::Forbidden(
                            "You are not a member of this organization".to_string(),
                        ));
                    }
                    Some(org)
                }
                None => None,
            };
            if let Some(id) = session_id {
                self.stores
                    .sessions
                    .set_active_organization(id, org.as_ref().map(|o| o.id))
                    .await?;
            }
            Ok(Done::new(org))
        })
        .await
    }

    pub async fn list_members(&self, session: Option<&Session>) -> ActionResult<Vec<MemberDetail>> {
        self.run(session, &LIST_MEMBERS, None, Some(String::new()), |p| async move {
            let org = active_organization(&p)?;
            Ok(Done::new(self.stores.organizations.list_members(org).await?))
        })
        .await
    }

    /// Actors can neither grant nor change a role above their own, and the
    /// last owner cannot be demoted.
    pub async fn update_member_role(
        &self,
        session: Option<&Session>,
        user_id: UserId,
        role: Role,
    ) -> ActionResult<Membership> {
        self.run(session, &UPDATE_MEMBER_ROLE, None, None, |p| async move {
            let org = active_organization(&p)?;
            ensure_can_grant(p.role, role)?;
            let members = self.memberships(org).await?;
            let current = find_member(&members, user_id)?;
            ensure_not_above(p.role, current.role)?;
            ensure_owner_remains(&members, user_id, Some(role))?;

            self.stores
                .organizations
                .update_membership_role(org, user_id, role)
                .await?;
            let updated = Membership {
                role,
                ..current.clone()
            };
            Ok(Done::tagged(updated, TagIds::default().user(user_id)))
        })
        .await
    }

    pub async fn remove_member(&self, session: Option<&Session>, user_id: UserId) -> ActionResult<()> {
        self.run(session, &REMOVE_MEMBER, None, None, |p| async move {
            let org = active_organization(&p)?;
            let members = self.memberships(org).await?;
            let current = find_member(&members, user_id)?;
            ensure_not_above(p.role, current.role)?;
            ensure_owner_remains(&members, user_id, None)?;

            self.stores.organizations.delete_membership(org, user_id).await?;
            tracing::info!(organization_id = %org, %user_id, "member removed");
            Ok(Done::tagged((), TagIds::default().user(user_id)))
        })
        .await
    }

    /// Invite by email into the active organization and send the link.
    /// A failed send is logged; the invitation stands.
    pub async fn create_invitation(
        &self,
        session: Option<&Session>,
        input: NewInvitationInput,
    ) -> ActionResult<Invitation> {
        self.run(session, &CREATE_INVITATION, None, None, |p| async move {
            let org_id = active_organization(&p)?;
            let invite = input.validate(p.role)?;
            let org = self
                .stores
                .organizations
                .find_organization(org_id)
                .await?
                .ok_or(AccessError::NotFound("Organization"))?;

            if let Some(user) = self.stores.users.find_user_by_email(&invite.email).await? {
                if self.stores.organizations.find_membership(org_id, user.id).await?.is_some() {
                    return Err(AccessError::conflict(
                        "This user is already a member of the organization",
                    ));
                }
            }
            let now = Utc::now();
            let pending = self.stores.organizations.list_invitations(org_id).await?;
            if pending.iter().any(|i| {
                i.email == invite.email && i.status == InvitationStatus::Pending && !i.is_expired(now)
            }) {
                return Err(AccessError::conflict(
                    "A pending invitation already exists for this email",
                ));
            }

            let invitation = Invitation::issue(org_id, invite, p.user_id, now);
            self.stores.organizations.insert_invitation(&invitation).await?;

            let accept_url = format!("{}/invitations/{}/accept", self.config.base_url, invitation.id);
            let email = invitation_email(
                invitation.email.as_str(),
                &org.name,
                invitation.role.as_str(),
                &accept_url,
            );
            if let Err(e) = self.email.send(email).await {
                tracing::error!(invitation_id = %invitation.id, error = %e, "invitation email failed");
            }
            Ok(Done::new(invitation))
        })
        .await
    }

    pub async fn list_invitations(&self, session: Option<&Session>) -> ActionResult<Vec<Invitation>> {
        self.run(session, &LIST_INVITATIONS, None, Some(String::new()), |p| async move {
            let org = active_organization(&p)?;
            Ok(Done::new(self.stores.organizations.list_invitations(org).await?))
        })
        .await
    }

    pub async fn cancel_invitation(
        &self,
        session: Option<&Session>,
        id: InvitationId,
    ) -> ActionResult<Invitation> {
        self.run(session, &CANCEL_INVITATION, None, None, |p| async move {
            let mut invitation = self.invitation(id).await?;
            ensure_scope(&p, &invitation)?;
            invitation.ensure_cancellable()?;
            invitation.status = InvitationStatus::Cancelled;
            self.stores.organizations.update_invitation(&invitation).await?;
            Ok(Done::new(invitation))
        })
        .await
    }

    /// The signed-in user's email must match. Creates the membership and
    /// makes the organization active.
    pub async fn accept_invitation(
        &self,
        session: Option<&Session>,
        id: InvitationId,
    ) -> ActionResult<Membership> {
        let session_id = session.map(|s| s.id);
        let email = session.map(|s| s.email.clone()).unwrap_or_default();
        self.run(session, &ACCEPT_INVITATION, None, None, |p| async move {
            let mut invitation = self.invitation(id).await?;
            let now = Utc::now();
            if invitation.status == InvitationStatus::Pending && invitation.is_expired(now) {
                invitation.status = InvitationStatus::Expired;
                self.stores.organizations.update_invitation(&invitation).await?;
            }
            invitation.ensure_acceptable(&email, now)?;

            let membership = Membership {
                organization_id: invitation.organization_id,
                user_id: p.user_id,
                role: invitation.role,
                created_at: now,
            };
            self.stores.organizations.insert_membership(&membership).await?;
            invitation.status = InvitationStatus::Accepted;
            self.stores.organizations.update_invitation(&invitation).await?;
            if let Some(id) = session_id {
                self.stores
                    .sessions
                    .set_active_organization(id, Some(invitation.organization_id))
                    .await?;
            }
            let ids = TagIds::default().organization(invitation.organization_id);
            Ok(Done::tagged(membership, ids))
        })
        .await
    }

    pub(crate) async fn organization_by_slug(&self, slug: &str) -> AccessResult<Organization> {
        self.stores
            .organizations
            .find_organization_by_slug(slug.trim())
            .await?
            .ok_or(AccessError::NotFound("Organization"))
    }

    async fn invitation(&self, id: InvitationId) -> AccessResult<Invitation> {
        self.stores
            .organizations
            .find_invitation(id)
            .await?
            .ok_or(AccessError::NotFound("Invitation"))
    }

    async fn memberships(&self, org: OrganizationId) -> AccessResult<Vec<Membership>> {
        let members = self.stores.organizations.list_members(org).await?;
        Ok(members.into_iter().map(|m| m.membership).collect())
    }

    async fn is_platform_admin(&self, user_id: UserId) -> AccessResult<bool> {
        let user = self.stores.users.find_user(user_id).await?;
        Ok(user.is_some_and(|u| u.is_platform_admin()))
    }
}

fn find_member(members: &[Membership], user_id: UserId) -> AccessResult<&Membership> {
    members
        .iter()
        .find(|m| m.user_id == user_id)
        .ok_or(AccessError::NotFound("Member"))
}

fn ensure_not_above(actor: Role, target: Role) -> AccessResult<()> {
    if target > actor {
        return Err(AccessError::Forbidden(
            "You cannot change a member whose role is above your own".to_string(),
        ));
    }
    Ok(())
}
