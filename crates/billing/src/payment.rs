use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use miliki_core::{
    DomainError, DomainResult, Entity, FieldErrors, GuestId, InvoiceId, OrganizationId,
    OrganizationScoped, PaymentId, TenancyId, UserId,
};

use crate::{Invoice, InvoiceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    MobileMoney,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::MobileMoney => "MOBILE_MONEY",
            PaymentMethod::Card => "CARD",
        }
    }
}

impl core::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(Self::Cash),
            "BANK_TRANSFER" => Ok(Self::BankTransfer),
            "MOBILE_MONEY" => Ok(Self::MobileMoney),
            "CARD" => Ok(Self::Card),
            other => Err(DomainError::validation(
                "method",
                format!("Unknown payment method '{other}'"),
            )),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        )
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(DomainError::validation(
                "status",
                format!("Unknown payment status '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub organization_id: OrganizationId,
    pub invoice_id: Option<InvoiceId>,
    pub tenancy_id: Option<TenancyId>,
    pub guest_id: Option<GuestId>,
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &PaymentId {
        &self.id
    }
}

impl OrganizationScoped for Payment {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

impl Payment {
    pub fn record(
        organization_id: OrganizationId,
        created_by: UserId,
        input: ValidPayment,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            organization_id,
            invoice_id: input.invoice_id,
            tenancy_id: input.tenancy_id,
            guest_id: input.guest_id,
            amount: input.amount,
            method: input.method,
            status: input.status,
            reference: input.reference,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "Cannot change a {} payment to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> DomainResult<()> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Failed => Ok(()),
            other => Err(DomainError::invariant(format!(
                "Only PENDING or FAILED payments can be deleted (this one is {other})"
            ))),
        }
    }
}

/// Sum of COMPLETED payments against `invoice_id`, excluding `exclude`.
pub fn completed_total(payments: &[Payment], invoice_id: InvoiceId, exclude: Option<PaymentId>) -> i64 {
    payments
        .iter()
        .filter(|p| p.invoice_id == Some(invoice_id))
        .filter(|p| p.status == PaymentStatus::Completed && Some(p.id) != exclude)
        .map(|p| p.amount)
        .sum()
}

/// Checks that completing `amount` against `invoice` does not overpay it.
///
/// `already_paid` is the completed total excluding the payment in question.
pub fn ensure_within_balance(invoice: &Invoice, already_paid: i64, amount: i64) -> DomainResult<()> {
    if !invoice.status.is_open() {
        return Err(DomainError::invariant(format!(
            "This invoice is {} and cannot take payments",
            invoice.status
        )));
    }
    let outstanding = invoice.amount - already_paid;
    if amount > outstanding {
        return Err(DomainError::invariant(format!(
            "Payment of {amount} exceeds the outstanding balance of {outstanding}"
        )));
    }
    Ok(())
}

/// Status the invoice should move to given its completed total, if any.
/// A PAID invoice that is no longer covered reopens as OVERDUE when its due
/// date has passed.
pub fn settlement_status(invoice: &Invoice, completed: i64, today: NaiveDate) -> Option<InvoiceStatus> {
    match invoice.status {
        s if s.is_open() && completed >= invoice.amount => Some(InvoiceStatus::Paid),
        InvoiceStatus::Paid if completed < invoice.amount => Some(if invoice.due_date < today {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Pending
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentInput {
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    #[serde(default)]
    pub tenancy_id: Option<TenancyId>,
    #[serde(default)]
    pub guest_id: Option<GuestId>,
    pub amount: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPayment {
    pub invoice_id: Option<InvoiceId>,
    pub tenancy_id: Option<TenancyId>,
    pub guest_id: Option<GuestId>,
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
}

impl NewPaymentInput {
    pub fn validate(self) -> DomainResult<ValidPayment> {
        let mut errors = FieldErrors::new();
        if self.amount <= 0 {
            errors.push("amount", "Amount must be greater than zero");
        }
        let status = self.status.unwrap_or(PaymentStatus::Pending);
        if !matches!(status, PaymentStatus::Pending | PaymentStatus::Completed) {
            errors.push("status", "New payments must be PENDING or COMPLETED");
        }
        let reference = self
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if reference.as_ref().is_some_and(|r| r.len() > 100) {
            errors.push("reference", "Reference must be at most 100 characters");
        }
        errors.into_result()?;
        Ok(ValidPayment {
            invoice_id: self.invoice_id,
            tenancy_id: self.tenancy_id,
            guest_id: self.guest_id,
            amount: self.amount,
            method: self.method,
            status,
            reference,
        })
    }
}
