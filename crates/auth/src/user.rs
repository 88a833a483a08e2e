//! User accounts and sign-up/sign-in input validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{DomainError, DomainResult, EmailAddress, Entity, FieldErrors, UserId};

use crate::Role;

/// A user account.
///
/// `platform_role` is either `User` or `Admin`; organization roles live on
/// memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub username: String,
    pub name: String,
    pub platform_role: Role,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

impl User {
    pub fn is_platform_admin(&self) -> bool {
        self.platform_role == Role::Admin
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpInput {
    pub email: String,
    pub username: String,
    pub name: String,
    pub password: String,
}

/// Sign-up input after validation and normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignUp {
    pub email: EmailAddress,
    pub username: String,
    pub name: String,
    pub password: String,
}

impl SignUpInput {
    pub fn validate(self) -> DomainResult<ValidSignUp> {
        let mut errors = FieldErrors::new();

        let email = match EmailAddress::parse(&self.email) {
            Ok(e) => Some(e),
            Err(_) => {
                errors.push("email", "Enter a valid email address");
                None
            }
        };

        let username = self.username.trim().to_lowercase();
        if !(3..=32).contains(&username.chars().count()) {
            errors.push("username", "Username must be between 3 and 32 characters");
        } else if !username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
        {
            errors.push(
                "username",
                "Username may only contain letters, digits, underscores and dots",
            );
        }

        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.push("name", "Name is required");
        } else if name.chars().count() > 100 {
            errors.push("name", "Name must be at most 100 characters");
        }

        let password_len = self.password.chars().count();
        if password_len < 8 {
            errors.push("password", "Password must be at least 8 characters");
        } else if password_len > 128 {
            errors.push("password", "Password must be at most 128 characters");
        }

        errors.into_result()?;
        let Some(email) = email else {
            return Err(DomainError::validation("email", "Enter a valid email address"));
        };
        Ok(ValidSignUp {
            email,
            username,
            name,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SignUpInput {
        SignUpInput {
            email: "Amina@Example.com".into(),
            username: "Amina_K".into(),
            name: " Amina Kamau ".into(),
            password: "s3cret-pass".into(),
        }
    }

    #[test]
    fn valid_sign_up_is_normalized() {
        let v = input().validate().unwrap();
        assert_eq!(v.email.as_str(), "amina@example.com");
        assert_eq!(v.username, "amina_k");
        assert_eq!(v.name, "Amina Kamau");
    }

    #[test]
    fn every_bad_field_is_reported() {
        let err = SignUpInput {
            email: "nope".into(),
            username: "a!".into(),
            name: "".into(),
            password: "short".into(),
        }
        .validate()
        .unwrap_err();
        let DomainError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        for field in ["email", "username", "name", "password"] {
            assert!(fields.message_for(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: UserId::new(),
            email: EmailAddress::parse("a@b.co").unwrap(),
            username: "abc".into(),
            name: "A".into(),
            platform_role: Role::User,
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
