use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use miliki_auth::SessionToken;
use miliki_infra::AppServices;
use miliki_infra::session::SESSION_COOKIE;

use crate::context::CurrentSession;

/// Paths reachable without a session.
pub const PUBLIC_PATHS: [&str; 5] = [
    "/health",
    "/login",
    "/signup",
    "/api/auth/sign-in",
    "/api/auth/sign-up",
];

pub const LOGIN_PATH: &str = "/login";

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// Resolve the session for every request. Anonymous requests outside the
/// allow-list are redirected (303) to the login page with the original path.
pub async fn session_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = match presented_token(req.headers()) {
        Some(token) => services.resolve_session(&token).await,
        None => None,
    };

    let path = req.uri().path();
    if session.is_none() && !is_public(path) {
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(path);
        tracing::debug!(path, "anonymous request redirected to login");
        return Redirect::to(&login_redirect(target)).into_response();
    }

    req.extensions_mut().insert(CurrentSession::new(session));
    next.run(req).await
}

/// `/login?redirect=<target>`, with the target URL-encoded.
pub fn login_redirect(target: &str) -> String {
    match serde_urlencoded::to_string([("redirect", target)]) {
        Ok(query) => format!("{LOGIN_PATH}?{query}"),
        Err(_) => LOGIN_PATH.to_string(),
    }
}

/// Session cookie first, then `Authorization: Bearer`.
fn presented_token(headers: &HeaderMap) -> Option<SessionToken> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

fn cookie_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionToken::from_presented(value))
}

fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    SessionToken::from_presented(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn allow_list_matches_exact_paths() {
        assert!(is_public("/health"));
        assert!(is_public("/api/auth/sign-in"));
        assert!(!is_public("/api/auth/sign-out"));
        assert!(!is_public("/api/properties"));
    }

    #[test]
    fn redirect_target_is_encoded() {
        assert_eq!(
            login_redirect("/api/properties?x=1"),
            "/login?redirect=%2Fapi%2Fproperties%3Fx%3D1"
        );
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; miliki_session=from-cookie"),
        );
        assert_eq!(presented_token(&headers).unwrap().as_str(), "from-cookie");

        headers.remove(header::COOKIE);
        assert_eq!(presented_token(&headers).unwrap().as_str(), "from-header");
    }

    #[test]
    fn blank_tokens_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(presented_token(&headers).is_none());
    }
}
