use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{DomainError, DomainResult, Entity, FieldErrors, OrganizationId, UserId};

/// URL-safe organization handle: `[a-z0-9-]`, 3..=48 chars, no leading,
/// trailing or doubled dashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let slug = raw.trim().to_lowercase();
        let len = slug.chars().count();
        if !(3..=48).contains(&len) {
            return Err(DomainError::validation("slug", "Slug must be between 3 and 48 characters"));
        }
        let charset_ok = slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !charset_ok || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
            return Err(DomainError::validation(
                "slug",
                "Slug may only contain lowercase letters, digits and single dashes",
            ));
        }
        Ok(Self(slug))
    }

    /// Derive a slug from a display name ("Acme Homes Ltd." → "acme-homes-ltd").
    pub fn from_name(name: &str) -> DomainResult<Self> {
        let mut out = String::with_capacity(name.len());
        for c in name.trim().to_lowercase().chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c);
            } else if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
        }
        let trimmed: String = out.trim_end_matches('-').chars().take(48).collect();
        Self::parse(trimmed.trim_end_matches('-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Slug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tenant boundary: owns properties and has members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: Slug,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Organization {
    type Id = OrganizationId;

    fn id(&self) -> &OrganizationId {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganizationInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl NewOrganizationInput {
    pub fn validate(self) -> DomainResult<(String, Slug)> {
        let mut errors = FieldErrors::new();
        let name = validate_name(&self.name, &mut errors);

        let slug = match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Slug::parse(raw),
            None => Slug::from_name(&name),
        };
        let slug = match slug {
            Ok(s) => Some(s),
            Err(DomainError::Validation(fields)) => {
                for f in fields.iter() {
                    errors.push("slug", f.message.clone());
                }
                None
            }
            Err(e) => return Err(e),
        };

        errors.into_result()?;
        match slug {
            Some(slug) => Ok((name, slug)),
            None => Err(DomainError::validation("slug", "Slug is required")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrganizationInput {
    pub name: Option<String>,
}

impl UpdateOrganizationInput {
    pub fn validate(self) -> DomainResult<Option<String>> {
        let mut errors = FieldErrors::new();
        let name = self.name.map(|n| validate_name(&n, &mut errors));
        errors.into_result()?;
        Ok(name)
    }
}

fn validate_name(raw: &str, errors: &mut FieldErrors) -> String {
    let name = raw.trim().to_string();
    if name.chars().count() < 2 {
        errors.push("name", "Organization name must be at least 2 characters");
    } else if name.chars().count() > 100 {
        errors.push("name", "Organization name must be at most 100 characters");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_name_collapses_punctuation() {
        assert_eq!(Slug::from_name("  Acme Homes, Ltd. ").unwrap().as_str(), "acme-homes-ltd");
    }

    #[test]
    fn explicit_slug_is_validated() {
        let err = NewOrganizationInput {
            name: "Acme".into(),
            slug: Some("bad slug!".into()),
        }
        .validate()
        .unwrap_err();
        let DomainError::Validation(fields) = err else { panic!() };
        assert!(fields.message_for("slug").is_some());
    }

    #[test]
    fn slug_edge_dashes_rejected() {
        assert!(Slug::parse("-acme").is_err());
        assert!(Slug::parse("acme--homes").is_err());
        assert!(Slug::parse("ab").is_err());
        assert!(Slug::parse("acme-homes").is_ok());
    }

    #[test]
    fn short_name_is_rejected() {
        assert!(NewOrganizationInput { name: "A".into(), slug: Some("abc".into()) }.validate().is_err());
    }
}
