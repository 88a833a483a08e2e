use chrono::Utc;

use miliki_auth::Session;
use miliki_billing::{
    Invoice, InvoiceStatus, NewInvoiceInput, NewPaymentInput, Payment, PaymentStatus,
    completed_total, ensure_within_balance, settlement_status,
};
use miliki_core::{DomainError, InvoiceId, Owned, PaymentId};

use crate::access::{AccessError, AccessResult, ActionResult, Done, active_organization, ensure_scope};
use crate::catalog::{
    CREATE_INVOICE, DELETE_INVOICE, DELETE_PAYMENT, GET_INVOICE, GET_PAYMENT, LIST_INVOICES,
    LIST_PAYMENTS, RECORD_PAYMENT, UPDATE_INVOICE_STATUS, UPDATE_PAYMENT_STATUS,
};
use crate::services::AppServices;

impl AppServices {
    /// The amount defaults to the tenancy's rent.
    pub async fn create_invoice(
        &self,
        session: Option<&Session>,
        input: NewInvoiceInput,
    ) -> ActionResult<Invoice> {
        self.run(session, &CREATE_INVOICE, None, None, |p| async move {
            let tenancy = self.tenancy(input.tenancy_id).await?;
            ensure_scope(&p, &tenancy)?;
            let invoice = Invoice::issue(
                tenancy.organization_id,
                input.validate(tenancy.rent_amount)?,
                Utc::now(),
            );
            self.stores.billing.insert_invoice(&invoice).await?;
            Ok(Done::new(invoice))
        })
        .await
    }

    pub async fn list_invoices(&self, session: Option<&Session>) -> ActionResult<Vec<Invoice>> {
        self.run(session, &LIST_INVOICES, None, Some(String::new()), |p| async move {
            let org = active_organization(&p)?;
            Ok(Done::new(self.stores.billing.list_invoices(org).await?))
        })
        .await
    }

    pub async fn get_invoice(&self, session: Option<&Session>, id: InvoiceId) -> ActionResult<Invoice> {
        self.run(session, &GET_INVOICE, None, Some(id.to_string()), |p| async move {
            let invoice = self.invoice(id).await?;
            ensure_scope(&p, &invoice)?;
            Ok(Done::new(invoice))
        })
        .await
    }

    pub async fn update_invoice_status(
        &self,
        session: Option<&Session>,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> ActionResult<Invoice> {
        self.run(session, &UPDATE_INVOICE_STATUS, None, None, |p| async move {
            let mut invoice = self.invoice(id).await?;
            ensure_scope(&p, &invoice)?;
            invoice.transition(status, Utc::now())?;
            self.stores.billing.update_invoice(&invoice).await?;
            Ok(Done::new(invoice))
        })
        .await
    }

    /// Blocked while any payment references the invoice.
    pub async fn delete_invoice(&self, session: Option<&Session>, id: InvoiceId) -> ActionResult<()> {
        self.run(session, &DELETE_INVOICE, None, None, |p| async move {
            let invoice = self.invoice(id).await?;
            ensure_scope(&p, &invoice)?;
            let payments = self.stores.billing.list_payments_for_invoice(id).await?;
            invoice.ensure_deletable(payments.len())?;
            self.stores.billing.delete_invoice(id).await?;
            Ok(Done::new(()))
        })
        .await
    }

    /// Records a payment. Against an invoice the amount may not exceed the
    /// outstanding balance, and a COMPLETED payment that settles it marks
    /// the invoice PAID. The payment takes the invoice's tenancy.
    pub async fn record_payment(
        &self,
        session: Option<&Session>,
        input: NewPaymentInput,
    ) -> ActionResult<Payment> {
        self.run(session, &RECORD_PAYMENT, None, None, |p| async move {
            let org = active_organization(&p)?;
            let valid = input.validate()?;

            let mut invoice = match valid.invoice_id {
                Some(id) => {
                    let invoice = self.invoice(id).await?;
                    ensure_scope(&p, &invoice)?;
                    Some(invoice)
                }
                None => None,
            };
            if let Some(id) = valid.tenancy_id {
                let tenancy = self.tenancy(id).await?;
                ensure_scope(&p, &tenancy)?;
            }
            if let Some(id) = valid.guest_id {
                let guest = self.stores.guests.find_guest(id).await?;
                if !guest.is_some_and(|g| g.is_owned_by(p.user_id)) {
                    return Err(AccessError::NotFound("Guest"));
                }
            }

            let mismatched = invoice
                .as_ref()
                .zip(valid.tenancy_id)
                .is_some_and(|(inv, tenancy_id)| inv.tenancy_id != tenancy_id);
            if mismatched {
                return Err(DomainError::validation(
                    "tenancy_id",
                    "Tenancy does not match the invoice's tenancy",
                )
                .into());
            }

            let mut payment = Payment::record(org, p.user_id, valid, Utc::now());
            let mut settled = None;
            if let Some(invoice) = &invoice {
                payment.tenancy_id = Some(invoice.tenancy_id);
                let existing = self.stores.billing.list_payments_for_invoice(invoice.id).await?;
                let paid = completed_total(&existing, invoice.id, None);
                ensure_within_balance(invoice, paid, payment.amount)?;
                if payment.status == PaymentStatus::Completed {
                    let today = payment.created_at.date_naive();
                    settled = settlement_status(invoice, paid + payment.amount, today);
                }
            }

            self.stores.billing.insert_payment(&payment).await?;
            if let (Some(invoice), Some(status)) = (invoice.as_mut(), settled) {
                invoice.transition(status, payment.created_at)?;
                self.stores.billing.update_invoice(invoice).await?;
                tracing::info!(invoice_id = %invoice.id, status = %status, "invoice settled by payment");
            }
            Ok(Done::new(payment))
        })
        .await
    }

    pub async fn list_payments(&self, session: Option<&Session>) -> ActionResult<Vec<Payment>> {
        self.run(session, &LIST_PAYMENTS, None, Some(String::new()), |p| async move {
            let org = active_organization(&p)?;
            Ok(Done::new(self.stores.billing.list_payments(org).await?))
        })
        .await
    }

    pub async fn get_payment(&self, session: Option<&Session>, id: PaymentId) -> ActionResult<Payment> {
        self.run(session, &GET_PAYMENT, None, Some(id.to_string()), |p| async move {
            let payment = self.payment(id).await?;
            ensure_scope(&p, &payment)?;
            Ok(Done::new(payment))
        })
        .await
    }

    /// Completing a payment is checked against the invoice balance; the
    /// invoice then follows its completed total (PAID when covered, back to
    /// PENDING or, past its due date, OVERDUE after a refund).
    pub async fn update_payment_status(
        &self,
        session: Option<&Session>,
        id: PaymentId,
        status: PaymentStatus,
    ) -> ActionResult<Payment> {
        self.run(session, &UPDATE_PAYMENT_STATUS, None, None, |p| async move {
            let mut payment = self.payment(id).await?;
            ensure_scope(&p, &payment)?;
            let now = Utc::now();

            let mut invoice = match payment.invoice_id {
                Some(invoice_id) => Some(self.invoice(invoice_id).await?),
                None => None,
            };
            let others = match &invoice {
                Some(inv) => {
                    let existing = self.stores.billing.list_payments_for_invoice(inv.id).await?;
                    completed_total(&existing, inv.id, Some(id))
                }
                None => 0,
            };
            if let (Some(inv), PaymentStatus::Completed) = (&invoice, status) {
                ensure_within_balance(inv, others, payment.amount)?;
            }

            payment.transition(status, now)?;
            self.stores.billing.update_payment(&payment).await?;

            if let Some(inv) = invoice.as_mut() {
                let completed = others
                    + if payment.status == PaymentStatus::Completed {
                        payment.amount
                    } else {
                        0
                    };
                if let Some(next) = settlement_status(inv, completed, now.date_naive()) {
                    inv.transition(next, now)?;
                    self.stores.billing.update_invoice(inv).await?;
                    tracing::info!(invoice_id = %inv.id, status = %next, "invoice follows payments");
                }
            }
            Ok(Done::new(payment))
        })
        .await
    }

    /// Only PENDING or FAILED payments can be deleted.
    pub async fn delete_payment(&self, session: Option<&Session>, id: PaymentId) -> ActionResult<()> {
        self.run(session, &DELETE_PAYMENT, None, None, |p| async move {
            let payment = self.payment(id).await?;
            ensure_scope(&p, &payment)?;
            payment.ensure_deletable()?;
            self.stores.billing.delete_payment(id).await?;
            Ok(Done::new(()))
        })
        .await
    }

    async fn invoice(&self, id: InvoiceId) -> AccessResult<Invoice> {
        self.stores
            .billing
            .find_invoice(id)
            .await?
            .ok_or(AccessError::NotFound("Invoice"))
    }

    async fn payment(&self, id: PaymentId) -> AccessResult<Payment> {
        self.stores
            .billing
            .find_payment(id)
            .await?
            .ok_or(AccessError::NotFound("Payment"))
    }
}
