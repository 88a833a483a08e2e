use axum::{Json, extract::Query, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

/// Landing point for anonymous redirects. Rendering is left to the client;
/// this echoes where to send the user after signing in.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<Value> {
    Json(json!({
        "page": "login",
        "sign_in": "/api/auth/sign-in",
        "redirect": query.redirect.unwrap_or_else(|| "/".to_string()),
    }))
}

pub async fn signup_page() -> Json<Value> {
    Json(json!({
        "page": "signup",
        "sign_up": "/api/auth/sign-up",
    }))
}
