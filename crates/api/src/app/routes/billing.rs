//! Invoices and payments.

use std::sync::Arc;

use axum::{
    Extension, Router,
    response::Response,
    routing::{get, put},
};

use miliki_billing::{InvoiceStatus, NewInvoiceInput, NewPaymentInput, PaymentStatus};
use miliki_core::{InvoiceId, PaymentId};
use miliki_infra::AppServices;

use crate::app::dto::{Param, Payload, StatusChange};
use crate::app::errors::respond;
use crate::context::CurrentSession;

pub fn invoices_router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/:id", get(get_invoice).delete(delete_invoice))
        .route("/:id/status", put(update_invoice_status))
}

pub fn payments_router() -> Router {
    Router::new()
        .route("/", get(list_payments).post(record_payment))
        .route("/:id", get(get_payment).delete(delete_payment))
        .route("/:id/status", put(update_payment_status))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewInvoiceInput>,
) -> Response {
    respond(services.create_invoice(ctx.session(), input).await)
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.list_invoices(ctx.session()).await)
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<InvoiceId>,
) -> Response {
    respond(services.get_invoice(ctx.session(), id).await)
}

pub async fn update_invoice_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<InvoiceId>,
    Payload(body): Payload<StatusChange<InvoiceStatus>>,
) -> Response {
    respond(services.update_invoice_status(ctx.session(), id, body.status).await)
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<InvoiceId>,
) -> Response {
    respond(services.delete_invoice(ctx.session(), id).await)
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Payload(input): Payload<NewPaymentInput>,
) -> Response {
    respond(services.record_payment(ctx.session(), input).await)
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    respond(services.list_payments(ctx.session()).await)
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<PaymentId>,
) -> Response {
    respond(services.get_payment(ctx.session(), id).await)
}

pub async fn update_payment_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<PaymentId>,
    Payload(body): Payload<StatusChange<PaymentStatus>>,
) -> Response {
    respond(services.update_payment_status(ctx.session(), id, body.status).await)
}

pub async fn delete_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
    Param(id): Param<PaymentId>,
) -> Response {
    respond(services.delete_payment(ctx.session(), id).await)
}
