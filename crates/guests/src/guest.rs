use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    DomainError, DomainResult, EmailAddress, Entity, FieldErrors, GuestId, Owned, PhoneNumber,
    UserId,
};

use crate::{Booking, BookingStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub created_by: UserId,
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Option<EmailAddress>,
    pub id_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Guest {
    type Id = GuestId;

    fn id(&self) -> &GuestId {
        &self.id
    }
}

impl Owned for Guest {
    fn owner_id(&self) -> UserId {
        self.created_by
    }
}

impl Guest {
    pub fn register(created_by: UserId, input: ValidGuest, now: DateTime<Utc>) -> Self {
        Self {
            id: GuestId::new(),
            created_by,
            name: input.name,
            phone: input.phone,
            email: input.email,
            id_number: input.id_number,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, input: ValidGuest, now: DateTime<Utc>) {
        self.name = input.name;
        self.phone = input.phone;
        self.email = input.email;
        self.id_number = input.id_number;
        self.notes = input.notes;
        self.updated_at = now;
    }

    /// Values as they would be after an update, for re-validation.
    pub fn merged(&self, patch: UpdateGuestInput) -> NewGuestInput {
        NewGuestInput {
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            phone: patch.phone.unwrap_or_else(|| self.phone.to_string()),
            email: patch
                .email
                .or_else(|| self.email.as_ref().map(ToString::to_string)),
            id_number: patch.id_number.or_else(|| self.id_number.clone()),
            notes: patch.notes.or_else(|| self.notes.clone()),
        }
    }
}

/// Which unique field an existing guest already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestConflict {
    Phone,
    Email,
}

impl GuestConflict {
    pub fn message(self) -> &'static str {
        match self {
            GuestConflict::Phone => "A guest with this phone number already exists",
            GuestConflict::Email => "A guest with this email already exists",
        }
    }
}

/// Finds a guest of the same creator that already uses `phone` or `email`.
/// Phone clashes are reported first.
pub fn find_conflict<'a>(
    existing: &'a [Guest],
    candidate: &ValidGuest,
    exclude: Option<GuestId>,
) -> Option<(GuestConflict, &'a Guest)> {
    let others = || existing.iter().filter(move |g| Some(g.id) != exclude);
    if let Some(g) = others().find(|g| g.phone == candidate.phone) {
        return Some((GuestConflict::Phone, g));
    }
    let email = candidate.email.as_ref()?;
    others()
        .find(|g| g.email.as_ref() == Some(email))
        .map(|g| (GuestConflict::Email, g))
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGuestInput {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidGuest {
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Option<EmailAddress>,
    pub id_number: Option<String>,
    pub notes: Option<String>,
}

impl NewGuestInput {
    pub fn validate(self) -> DomainResult<ValidGuest> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim().to_string();
        if name.chars().count() < 2 {
            errors.push("name", "Name must be at least 2 characters");
        } else if name.chars().count() > 100 {
            errors.push("name", "Name must be at most 100 characters");
        }

        let phone = match PhoneNumber::parse(&self.phone) {
            Ok(p) => Some(p),
            Err(e) => {
                errors.push("phone", e.to_string());
                None
            }
        };

        let email = match non_blank(self.email) {
            None => None,
            Some(raw) => match EmailAddress::parse(&raw) {
                Ok(e) => Some(e),
                Err(_) => {
                    errors.push("email", "Enter a valid email address");
                    None
                }
            },
        };

        let id_number = non_blank(self.id_number);
        if id_number.as_ref().is_some_and(|n| n.len() > 50) {
            errors.push("id_number", "ID number must be at most 50 characters");
        }
        let notes = non_blank(self.notes);
        if notes.as_ref().is_some_and(|n| n.chars().count() > 1000) {
            errors.push("notes", "Notes must be at most 1000 characters");
        }

        errors.into_result()?;
        let Some(phone) = phone else {
            return Err(DomainError::validation("phone", "Phone number is required"));
        };
        Ok(ValidGuest {
            name,
            phone,
            email,
            id_number,
            notes,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGuestInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub id_number: Option<String>,
    pub notes: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Records that keep a guest from being deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionBlockers {
    pub pending_bookings: usize,
    pub confirmed_bookings: usize,
    pub checked_in_bookings: usize,
    pub pending_payments: usize,
}

impl DeletionBlockers {
    pub fn tally(bookings: &[Booking], pending_payments: usize) -> Self {
        let count = |s: BookingStatus| bookings.iter().filter(|b| b.status == s).count();
        Self {
            pending_bookings: count(BookingStatus::Pending),
            confirmed_bookings: count(BookingStatus::Confirmed),
            checked_in_bookings: count(BookingStatus::CheckedIn),
            pending_payments,
        }
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    pub fn ensure_clear(&self) -> DomainResult<()> {
        if self.is_clear() {
            return Ok(());
        }
        let reasons: Vec<String> = [
            (self.pending_bookings, "pending booking"),
            (self.confirmed_bookings, "confirmed booking"),
            (self.checked_in_bookings, "checked-in booking"),
            (self.pending_payments, "pending payment"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, what)| format!("{n} {what}{}", if n == 1 { "" } else { "s" }))
        .collect();
        Err(DomainError::conflict(format!(
            "Cannot delete this guest: {}",
            reasons.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use miliki_core::BookingId;

    fn valid(phone: &str, email: Option<&str>) -> ValidGuest {
        NewGuestInput {
            name: "Wanjiru".into(),
            phone: phone.into(),
            email: email.map(Into::into),
            id_number: None,
            notes: None,
        }
        .validate()
        .unwrap()
    }

    fn booking(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: BookingId::new(),
            guest_id: GuestId::new(),
            created_by: UserId::new(),
            unit_id: None,
            check_in: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let g = NewGuestInput {
            name: " Otieno ".into(),
            phone: "+254 712-345-678".into(),
            email: Some("  ".into()),
            id_number: Some("".into()),
            notes: None,
        }
        .validate()
        .unwrap();
        assert_eq!(g.name, "Otieno");
        assert_eq!(g.phone.as_str(), "+254712345678");
        assert!(g.email.is_none() && g.id_number.is_none());
    }

    #[test]
    fn conflicts_report_the_existing_record() {
        let owner = UserId::new();
        let existing = Guest::register(owner, valid("0712345678", Some("a@b.co")), Utc::now());
        let guests = [existing.clone()];

        let (field, found) = find_conflict(&guests, &valid("0712 345 678", None), None).unwrap();
        assert_eq!(field, GuestConflict::Phone);
        assert_eq!(found.id, existing.id);
        assert_eq!(field.message(), "A guest with this phone number already exists");

        let (field, _) = find_conflict(&guests, &valid("0799000000", Some("A@B.co")), None).unwrap();
        assert_eq!(field, GuestConflict::Email);

        assert!(find_conflict(&guests, &valid("0712345678", None), Some(existing.id)).is_none());
    }

    #[test]
    fn blockers_enumerate_each_reason() {
        let bookings = [
            booking(BookingStatus::Pending),
            booking(BookingStatus::Confirmed),
            booking(BookingStatus::Confirmed),
            booking(BookingStatus::CheckedOut),
        ];
        let err = DeletionBlockers::tally(&bookings, 1).ensure_clear().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete this guest: 1 pending booking, 2 confirmed bookings, 1 pending payment"
        );
    }

    #[test]
    fn finished_bookings_do_not_block() {
        let bookings = [booking(BookingStatus::CheckedOut), booking(BookingStatus::Cancelled)];
        assert!(DeletionBlockers::tally(&bookings, 0).ensure_clear().is_ok());
    }

    #[test]
    fn merged_keeps_unchanged_fields() {
        let g = Guest::register(UserId::new(), valid("0712345678", Some("a@b.co")), Utc::now());
        let merged = g
            .merged(UpdateGuestInput {
                name: Some("New Name".into()),
                ..Default::default()
            })
            .validate()
            .unwrap();
        assert_eq!(merged.name, "New Name");
        assert_eq!(merged.phone, g.phone);
        assert_eq!(merged.email, g.email);
    }
}
