//! HTTP API: routing, session resolution, and envelope mapping.

pub mod app;
pub mod context;
pub mod middleware;
