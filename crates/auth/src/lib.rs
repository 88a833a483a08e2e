//! `miliki-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! role hierarchy, the declarative permission table, the evaluator, session
//! tokens and password hashing.

pub mod authorize;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod session;
pub mod user;

pub use authorize::{
    AuthorizationExplanation, AuthzError, Principal, authorize, explain_authorization, is_allowed,
};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::{Action, Permission, PermissionTable, Resource};
pub use roles::{Role, UnknownRole};
pub use session::{Session, SessionToken, SessionValidationError, validate_session_window};
pub use user::{SignInInput, SignUpInput, User, ValidSignUp};
