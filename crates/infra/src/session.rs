//! Session resolution: presented token → effective [`Session`].

use chrono::Utc;

use miliki_auth::{Role, Session, SessionToken, User, validate_session_window};
use miliki_core::{OrganizationId, SessionId};

use crate::services::AppServices;
use crate::store::{SessionRecord, StoreResult};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "miliki_session";

impl AppServices {
    /// Look up the session for `token`.
    ///
    /// Unknown or expired tokens resolve to `None`, as do store failures
    /// (logged). The effective role is `admin` for platform admins, else the
    /// membership role in the active organization, else `user`; an active
    /// organization the user no longer belongs to is ignored.
    pub async fn resolve_session(&self, token: &SessionToken) -> Option<Session> {
        match self.try_resolve_session(token).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                None
            }
        }
    }

    async fn try_resolve_session(&self, token: &SessionToken) -> StoreResult<Option<Session>> {
        let Some(record) = self
            .stores
            .sessions
            .find_session_by_token_hash(&token.hash())
            .await?
        else {
            return Ok(None);
        };
        if let Err(reason) = validate_session_window(record.created_at, record.expires_at, Utc::now())
        {
            tracing::debug!(session_id = %record.id, %reason, "session rejected");
            return Ok(None);
        }
        let Some(user) = self.stores.users.find_user(record.user_id).await? else {
            return Ok(None);
        };

        let (role, active_organization_id) = if user.is_platform_admin() {
            (Role::Admin, record.active_organization_id)
        } else {
            match record.active_organization_id {
                Some(org) => match self.stores.organizations.find_membership(org, user.id).await? {
                    Some(m) => (m.role, Some(org)),
                    None => (Role::User, None),
                },
                None => (Role::User, None),
            }
        };

        Ok(Some(Session {
            id: record.id,
            user_id: user.id,
            email: user.email.to_string(),
            name: user.name,
            role,
            active_organization_id,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }))
    }

    /// Persist a fresh session for `user` and return its token.
    pub(crate) async fn open_session(
        &self,
        user: &User,
        active_organization_id: Option<OrganizationId>,
    ) -> StoreResult<(SessionToken, SessionRecord)> {
        let token = SessionToken::generate();
        let now = Utc::now();
        let record = SessionRecord {
            id: SessionId::new(),
            user_id: user.id,
            token_hash: token.hash(),
            active_organization_id,
            created_at: now,
            expires_at: now + self.config.session_ttl,
        };
        self.stores.sessions.insert_session(&record).await?;
        tracing::info!(user_id = %user.id, session_id = %record.id, "session opened");
        Ok((token, record))
    }
}
