//! `permgate-core`: shared building blocks for the access engine.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod clock;
pub mod error;
pub mod id;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AccessError, AccessResult};
pub use id::{CompanyId, ModuleId, PermissionKey, TemplateId, UserId};
pub use version::ExpectedVersion;
