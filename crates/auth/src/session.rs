use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use miliki_core::{OrganizationId, SessionId, UserId};

use crate::Role;

/// Resolved request session (transport-agnostic).
///
/// `role` is the *effective* role: the membership role in the active
/// organization, `admin` for platform administrators, or `user` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active_organization_id: Option<OrganizationId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Opaque bearer token handed to the client.
///
/// Only the SHA-256 of the token is persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// 32 random bytes, hex-encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a token presented by a client. Returns `None` for blank values.
    pub fn from_presented(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key for this token.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl core::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (created_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= created_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a session's lifetime window.
pub fn validate_session_window(
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), SessionValidationError> {
    if expires_at <= created_at {
        return Err(SessionValidationError::InvalidTimeWindow);
    }
    // Allow small clock skew between app nodes and the database.
    if now + Duration::seconds(30) < created_at {
        return Err(SessionValidationError::NotYetValid);
    }
    if now >= expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_hex() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_stable_and_differs_from_token() {
        let t = SessionToken::from_presented("abc").unwrap();
        assert_eq!(t.hash(), t.clone().hash());
        assert_ne!(t.hash(), "abc");
        assert_eq!(t.hash().len(), 64);
    }

    #[test]
    fn blank_presented_token_is_none() {
        assert!(SessionToken::from_presented("   ").is_none());
    }

    #[test]
    fn window_validation() {
        let now = Utc::now();
        let created = now - Duration::days(1);
        assert!(validate_session_window(created, now + Duration::days(1), now).is_ok());
        assert_eq!(
            validate_session_window(created, now, now),
            Err(SessionValidationError::Expired)
        );
        assert_eq!(
            validate_session_window(now, now, now),
            Err(SessionValidationError::InvalidTimeWindow)
        );
        assert_eq!(
            validate_session_window(now + Duration::hours(1), now + Duration::days(2), now),
            Err(SessionValidationError::NotYetValid)
        );
    }
}
