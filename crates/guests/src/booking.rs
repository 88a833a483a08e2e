use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    BookingId, DomainError, DomainResult, Entity, FieldErrors, GuestId, Owned, UnitId, UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::CheckedOut => "CHECKED_OUT",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (CheckedIn, CheckedOut)
        )
    }

    /// Bookings that still hold their nights on the unit's calendar.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }
}

impl core::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CHECKED_IN" => Ok(Self::CheckedIn),
            "CHECKED_OUT" => Ok(Self::CheckedOut),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown booking status '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub guest_id: GuestId,
    pub created_by: UserId,
    pub unit_id: Option<UnitId>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Booking {
    type Id = BookingId;

    fn id(&self) -> &BookingId {
        &self.id
    }
}

impl Owned for Booking {
    fn owner_id(&self) -> UserId {
        self.created_by
    }
}

impl Booking {
    pub fn create(
        guest_id: GuestId,
        created_by: UserId,
        input: ValidBooking,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BookingId::new(),
            guest_id,
            created_by,
            unit_id: input.unit_id,
            check_in: input.check_in,
            check_out: input.check_out,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn transition(&mut self, next: BookingStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "Cannot change a {} booking to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBookingInput {
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBooking {
    pub unit_id: Option<UnitId>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl NewBookingInput {
    pub fn validate(self) -> DomainResult<ValidBooking> {
        let mut errors = FieldErrors::new();
        if self.check_out <= self.check_in {
            errors.push("check_out", "Check-out must be after check-in");
        }
        errors.into_result()?;
        Ok(ValidBooking {
            unit_id: self.unit_id,
            check_in: self.check_in,
            check_out: self.check_out,
        })
    }
}

/// Reject a stay on `unit_id` whose nights collide with a live booking.
/// The check-out day is free for the next arrival.
pub fn ensure_no_overlap(
    existing: &[Booking],
    unit_id: UnitId,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> DomainResult<()> {
    let clash = existing.iter().any(|b| {
        b.unit_id == Some(unit_id)
            && b.status.is_live()
            && b.check_in < check_out
            && check_in < b.check_out
    });
    if clash {
        return Err(DomainError::conflict(
            "This unit is already booked for some of these nights",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    #[test]
    fn check_out_must_follow_check_in() {
        let err = NewBookingInput {
            unit_id: None,
            check_in: d(5),
            check_out: d(5),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.to_string(), "Check-out must be after check-in");
    }

    #[test]
    fn lifecycle() {
        let input = NewBookingInput {
            unit_id: None,
            check_in: d(1),
            check_out: d(4),
        }
        .validate()
        .unwrap();
        let mut b = Booking::create(GuestId::new(), UserId::new(), input, Utc::now());
        assert_eq!(b.nights(), 3);
        assert!(b.transition(BookingStatus::CheckedIn, Utc::now()).is_err());
        b.transition(BookingStatus::Confirmed, Utc::now()).unwrap();
        b.transition(BookingStatus::CheckedIn, Utc::now()).unwrap();
        b.transition(BookingStatus::CheckedOut, Utc::now()).unwrap();
        assert!(b.transition(BookingStatus::Cancelled, Utc::now()).is_err());
    }

    #[test]
    fn overlap_ignores_closed_bookings_and_turnover_day() {
        let unit = UnitId::new();
        let stay = |check_in, check_out, status| Booking {
            status,
            ..Booking::create(
                GuestId::new(),
                UserId::new(),
                ValidBooking { unit_id: Some(unit), check_in, check_out },
                Utc::now(),
            )
        };
        let existing = vec![
            stay(d(10), d(14), BookingStatus::Confirmed),
            stay(d(1), d(30), BookingStatus::Cancelled),
            stay(d(1), d(30), BookingStatus::CheckedOut),
        ];

        let err = ensure_no_overlap(&existing, unit, d(12), d(16)).unwrap_err();
        assert_eq!(err.to_string(), "This unit is already booked for some of these nights");
        assert!(ensure_no_overlap(&existing, unit, d(14), d(18)).is_ok());
        assert!(ensure_no_overlap(&existing, unit, d(6), d(10)).is_ok());
        assert!(ensure_no_overlap(&existing, UnitId::new(), d(12), d(16)).is_ok());
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::CheckedIn).unwrap(),
            "\"CHECKED_IN\""
        );
    }
}
