use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use miliki_infra::ActionResult;

/// Serialize an envelope with the status its failure kind maps to.
pub fn respond<T: Serialize>(result: ActionResult<T>) -> Response {
    let status = StatusCode::from_u16(result.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(result)).into_response()
}

/// Failure envelope for requests rejected before reaching a service
/// (unreadable body, bad path or query).
pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message.into(),
            "error": code,
        })),
    )
        .into_response()
}

pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "handler panicked");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        "Something went wrong. Please try again.",
    )
}

#[cfg(test)]
mod tests {
    use miliki_infra::AccessError;

    use super::*;

    #[test]
    fn failure_status_follows_kind() {
        let res = respond(ActionResult::<()>::failure(AccessError::NotFound("Property")));
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = respond(ActionResult::ok("Property created", 1));
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn panics_become_generic_500() {
        let res = panic_response(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
