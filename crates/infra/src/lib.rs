//! Infrastructure layer: stores, cache, operation wrapper, config, email.

pub mod access;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod email;
pub mod services;
pub mod session;
pub mod store;

mod integration_tests;

pub use access::{AccessError, ActionResult, FailureKind};
pub use config::AppConfig;
pub use services::AppServices;
