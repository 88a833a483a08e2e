//! Value objects: equality by value, not identity.
//!
//! Value objects have **no identity**; two with the same normalized value are
//! equal. The constructors here normalize input so that uniqueness checks in
//! stores compare like with like.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A syntactically plausible, lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return Err(DomainError::validation("email", "Email is required"));
        }
        if email.len() > 254 || email.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("email", "Enter a valid email address"));
        }
        let Some((local, domain)) = email.split_once('@') else {
            return Err(DomainError::validation("email", "Enter a valid email address"));
        };
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@');
        if local.is_empty() || !domain_ok {
            return Err(DomainError::validation("email", "Enter a valid email address"));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for EmailAddress {}

impl core::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phone number normalized to an optional leading `+` followed by digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("phone", "Phone number is required"));
        }

        let mut normalized = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '+' if i == 0 => normalized.push(c),
                '0'..='9' => normalized.push(c),
                ' ' | '-' | '(' | ')' | '.' => {}
                _ => {
                    return Err(DomainError::validation(
                        "phone",
                        "Phone number may only contain digits, spaces, dashes and a leading +",
                    ));
                }
            }
        }

        let digits = normalized.trim_start_matches('+').len();
        if !(7..=15).contains(&digits) {
            return Err(DomainError::validation(
                "phone",
                "Phone number must have between 7 and 15 digits",
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for PhoneNumber {}

impl core::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = EmailAddress::parse("  Jane.Doe@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "jane.doe@example.com");
    }

    #[test]
    fn email_without_domain_dot_is_rejected() {
        assert!(EmailAddress::parse("jane@localhost").is_err());
        assert!(EmailAddress::parse("@example.com").is_err());
        assert!(EmailAddress::parse("jane example@x.com").is_err());
    }

    #[test]
    fn phone_formatting_characters_are_stripped() {
        let a = PhoneNumber::parse("+254 (712) 345-678").unwrap();
        let b = PhoneNumber::parse("+254712345678").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn phone_rejects_letters_and_short_numbers() {
        assert!(PhoneNumber::parse("0712abc").is_err());
        assert!(PhoneNumber::parse("12345").is_err());
        assert!(PhoneNumber::parse("0712+345678").is_err());
    }
}
