//! Sign-up, sign-in and sign-out. Successful sign-in sets the session cookie;
//! the token is also returned in the envelope for bearer clients.

use std::sync::Arc;

use axum::{
    Extension, Router,
    http::{HeaderValue, header},
    response::Response,
    routing::{get, post},
};

use miliki_auth::{SignInInput, SignUpInput};
use miliki_infra::session::SESSION_COOKIE;
use miliki_infra::{ActionResult, AppServices, services::SignedIn};

use crate::app::{dto::Payload, errors};
use crate::context::CurrentSession;

pub fn router() -> Router {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
        .route("/session", get(current_session))
}

pub async fn sign_up(
    Extension(services): Extension<Arc<AppServices>>,
    Payload(input): Payload<SignUpInput>,
) -> Response {
    let result = services.sign_up(input).await;
    with_session_cookie(&services, result)
}

pub async fn sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    Payload(input): Payload<SignInInput>,
) -> Response {
    let result = services.sign_in(input).await;
    with_session_cookie(&services, result)
}

pub async fn sign_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    let result = services.sign_out(ctx.session()).await;
    let cleared = result.success;
    let mut res = errors::respond(result);
    if cleared {
        set_cookie(&mut res, format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"));
    }
    res
}

pub async fn current_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<CurrentSession>,
) -> Response {
    errors::respond(services.current_session(ctx.session()).await)
}

fn with_session_cookie(services: &AppServices, result: ActionResult<SignedIn>) -> Response {
    let cookie = result.data.as_ref().map(|signed_in| {
        format!(
            "{SESSION_COOKIE}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
            signed_in.token,
            services.config.session_ttl.num_seconds()
        )
    });
    let mut res = errors::respond(result);
    if let Some(cookie) = cookie {
        set_cookie(&mut res, cookie);
    }
    res
}

fn set_cookie(res: &mut Response, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => tracing::error!(error = %err, "session cookie is not a valid header value"),
    }
}
