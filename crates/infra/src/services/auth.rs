use chrono::Utc;
use serde::Serialize;

use miliki_auth::{
    Role, Session, SignInInput, SignUpInput, User, hash_password, verify_password,
};
use miliki_core::{EmailAddress, UserId};

use crate::access::{AccessError, AccessResult, ActionResult, Done};
use crate::catalog::{CURRENT_SESSION, SIGN_IN, SIGN_OUT, SIGN_UP};
use crate::services::AppServices;

/// A new session: the bearer token (also set as the session cookie) and the
/// resolved session.
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub session: Session,
}

impl AppServices {
    pub async fn sign_up(&self, input: SignUpInput) -> ActionResult<SignedIn> {
        self.run_public(&SIGN_UP, async {
            let valid = input.validate()?;
            let password = valid.password;
            let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
                .await
                .map_err(AccessError::internal)?
                .map_err(AccessError::internal)?;

            let user = User {
                id: UserId::new(),
                email: valid.email,
                username: valid.username,
                name: valid.name,
                platform_role: Role::User,
                password_hash,
                created_at: Utc::now(),
            };
            self.stores.users.insert_user(&user).await?;
            tracing::info!(user_id = %user.id, "account created");
            self.signed_in(&user).await
        })
        .await
    }

    pub async fn sign_in(&self, input: SignInInput) -> ActionResult<SignedIn> {
        self.run_public(&SIGN_IN, async {
            let email = EmailAddress::parse(&input.email).map_err(|_| AccessError::InvalidCredentials)?;
            let Some(user) = self.stores.users.find_user_by_email(&email).await? else {
                return Err(AccessError::InvalidCredentials);
            };
            let hash = user.password_hash.clone();
            let password = input.password;
            let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .map_err(AccessError::internal)?
                .map_err(AccessError::internal)?;
            if !matches {
                return Err(AccessError::InvalidCredentials);
            }
            self.signed_in(&user).await
        })
        .await
    }

    pub async fn sign_out(&self, session: Option<&Session>) -> ActionResult<()> {
        let session_id = session.map(|s| s.id);
        self.run(session, &SIGN_OUT, None, None, |_| async move {
            if let Some(id) = session_id {
                self.stores.sessions.delete_session(id).await?;
            }
            Ok(Done::new(()))
        })
        .await
    }

    pub async fn current_session(&self, session: Option<&Session>) -> ActionResult<Session> {
        let current = session.cloned();
        self.run(session, &CURRENT_SESSION, None, None, |_| async move {
            current.map(Done::new).ok_or(AccessError::NotFound("Session"))
        })
        .await
    }

    /// Open a session, activating the user's most recent organization.
    async fn signed_in(&self, user: &User) -> AccessResult<SignedIn> {
        let organizations = self
            .stores
            .organizations
            .list_organizations_for_user(user.id)
            .await?;
        let active = organizations.first().map(|o| o.organization.id);
        let (token, _) = self.open_session(user, active).await?;
        let session = self
            .resolve_session(&token)
            .await
            .ok_or_else(|| AccessError::internal("new session did not resolve"))?;
        Ok(SignedIn {
            token: token.as_str().to_string(),
            session,
        })
    }
}
