use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    DomainError, DomainResult, Entity, FieldErrors, InvoiceId, OrganizationId, OrganizationScoped,
    TenancyId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    /// PAID may fall back to PENDING, or OVERDUE once past due, when a
    /// settling payment is refunded.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Overdue)
                | (Pending, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
                | (Paid, Pending)
                | (Paid, Overdue)
        )
    }

    /// Whether the invoice can still take payments.
    pub fn is_open(self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "OVERDUE" => Ok(Self::Overdue),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown invoice status '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub organization_id: OrganizationId,
    pub tenancy_id: TenancyId,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &InvoiceId {
        &self.id
    }
}

impl OrganizationScoped for Invoice {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Invoice {
    pub fn issue(organization_id: OrganizationId, input: ValidInvoice, now: DateTime<Utc>) -> Self {
        Self {
            id: InvoiceId::new(),
            organization_id,
            tenancy_id: input.tenancy_id,
            amount: input.amount,
            due_date: input.due_date,
            status: InvoiceStatus::Pending,
            description: input.description,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: InvoiceStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "Cannot change a {} invoice to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self, payment_count: usize) -> DomainResult<()> {
        if payment_count > 0 {
            return Err(DomainError::conflict(format!(
                "Cannot delete an invoice with recorded payments ({payment_count})"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoiceInput {
    pub tenancy_id: TenancyId,
    /// Defaults to the tenancy's rent.
    #[serde(default)]
    pub amount: Option<i64>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidInvoice {
    pub tenancy_id: TenancyId,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub description: Option<String>,
}

impl NewInvoiceInput {
    pub fn validate(self, tenancy_rent: i64) -> DomainResult<ValidInvoice> {
        let mut errors = FieldErrors::new();
        let amount = self.amount.unwrap_or(tenancy_rent);
        if amount <= 0 {
            errors.push("amount", "Amount must be greater than zero");
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if description.as_ref().is_some_and(|d| d.chars().count() > 500) {
            errors.push("description", "Description must be at most 500 characters");
        }
        errors.into_result()?;
        Ok(ValidInvoice {
            tenancy_id: self.tenancy_id,
            amount,
            due_date: self.due_date,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> Invoice {
        let input = NewInvoiceInput {
            tenancy_id: TenancyId::new(),
            amount: None,
            due_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            description: Some("  February rent ".into()),
        }
        .validate(50_000)
        .unwrap();
        Invoice::issue(OrganizationId::new(), input, Utc::now())
    }

    #[test]
    fn issue_defaults_amount_and_status() {
        let inv = invoice();
        assert_eq!(inv.amount, 50_000);
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert_eq!(inv.description.as_deref(), Some("February rent"));
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut inv = invoice();
        inv.transition(InvoiceStatus::Cancelled, Utc::now()).unwrap();
        assert!(inv.transition(InvoiceStatus::Paid, Utc::now()).is_err());
        assert!(!inv.status.is_open());
    }

    #[test]
    fn payments_block_deletion() {
        let inv = invoice();
        assert!(inv.ensure_deletable(0).is_ok());
        assert!(matches!(inv.ensure_deletable(2), Err(DomainError::Conflict(_))));
    }
}
