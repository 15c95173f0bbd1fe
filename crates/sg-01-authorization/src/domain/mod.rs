//! # Domain Layer - Authorization Gate
//!
//! - `entities`: `PreAuth`, `DefaultAuthPolicy`, `AccessTarget`, notification-to-permission mapping
//! - `authorizer`: `SessionAuthorizer` (policy variants) and the command-path check
//! - `errors`: `AuthorizationError`

pub mod authorizer;
pub mod entities;
pub mod errors;

pub use authorizer::*;
pub use entities::*;
pub use errors::*;
