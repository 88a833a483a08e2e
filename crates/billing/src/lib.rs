//! Billing domain module: rent invoices and the payments that settle them.
//!
//! Amounts are integers in minor currency units throughout.

pub mod invoice;
pub mod payment;

pub use invoice::{Invoice, InvoiceStatus, NewInvoiceInput, ValidInvoice};
pub use payment::{
    NewPaymentInput, Payment, PaymentMethod, PaymentStatus, ValidPayment, completed_total,
    ensure_within_balance, settlement_status,
};
