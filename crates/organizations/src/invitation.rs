use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use miliki_auth::Role;
use miliki_core::{
    DomainError, DomainResult, EmailAddress, Entity, InvitationId, OrganizationId,
    OrganizationScoped, UserId,
};

pub const INVITATION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Cancelled => "CANCELLED",
            InvitationStatus::Expired => "EXPIRED",
        }
    }
}

impl core::str::FromStr for InvitationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(DomainError::validation("status", format!("Unknown invitation status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub organization_id: OrganizationId,
    pub email: EmailAddress,
    pub role: Role,
    pub status: InvitationStatus,
    pub invited_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Entity for Invitation {
    type Id = InvitationId;

    fn id(&self) -> &InvitationId {
        &self.id
    }
}

impl OrganizationScoped for Invitation {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Invitation {
    pub fn issue(
        organization_id: OrganizationId,
        invite: ValidInvitation,
        invited_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvitationId::new(),
            organization_id,
            email: invite.email,
            role: invite.role,
            status: InvitationStatus::Pending,
            invited_by,
            created_at: now,
            expires_at: now + Duration::days(INVITATION_TTL_DAYS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks run before a signed-in user with `email` accepts.
    pub fn ensure_acceptable(&self, email: &str, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Accepted => {
                return Err(DomainError::conflict("This invitation has already been accepted"));
            }
            InvitationStatus::Cancelled | InvitationStatus::Expired => {
                return Err(DomainError::invariant("This invitation is no longer valid"));
            }
        }
        if self.is_expired(now) {
            return Err(DomainError::invariant("This invitation has expired"));
        }
        if !self.email.as_str().eq_ignore_ascii_case(email.trim()) {
            return Err(DomainError::invariant(
                "This invitation was sent to a different email address",
            ));
        }
        Ok(())
    }

    pub fn ensure_cancellable(&self) -> DomainResult<()> {
        if self.status != InvitationStatus::Pending {
            return Err(DomainError::invariant(format!(
                "Only pending invitations can be cancelled (status is {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvitationInput {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidInvitation {
    pub email: EmailAddress,
    pub role: Role,
}

impl NewInvitationInput {
    /// `inviter` is the acting user's role; invitees cannot outrank it.
    pub fn validate(self, inviter: Role) -> DomainResult<ValidInvitation> {
        let email = EmailAddress::parse(&self.email)?;
        crate::membership::ensure_can_grant(inviter, self.role)?;
        Ok(ValidInvitation {
            email,
            role: self.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(now: DateTime<Utc>) -> Invitation {
        let invite = NewInvitationInput {
            email: "Wanjiru@Example.com".into(),
            role: Role::Manager,
        }
        .validate(Role::Owner)
        .unwrap();
        Invitation::issue(OrganizationId::new(), invite, UserId::new(), now)
    }

    #[test]
    fn acceptable_by_matching_email_before_expiry() {
        let now = Utc::now();
        let inv = pending(now);
        assert!(inv.ensure_acceptable("wanjiru@example.com", now + Duration::days(1)).is_ok());
    }

    #[test]
    fn expired_invitation_is_rejected() {
        let now = Utc::now();
        let inv = pending(now);
        let err = inv
            .ensure_acceptable("wanjiru@example.com", now + Duration::days(INVITATION_TTL_DAYS))
            .unwrap_err();
        assert_eq!(err.to_string(), "This invitation has expired");
    }

    #[test]
    fn wrong_email_is_rejected() {
        let now = Utc::now();
        assert!(pending(now).ensure_acceptable("someone@else.com", now).is_err());
    }

    #[test]
    fn manager_cannot_invite_owner() {
        let err = NewInvitationInput {
            email: "x@y.io".into(),
            role: Role::Owner,
        }
        .validate(Role::Manager)
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
