//! Shared tracing setup.

pub mod subscriber;

pub use subscriber::{DEFAULT_FILTER, init, init_for_tests};
