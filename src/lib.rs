//! Faction operations toolkit.
//!
//! [`api`] wraps the faction REST API behind a rate limiter, retry loop and
//! circuit breaker. [`loader`] turns API payloads into optimizer inputs and
//! [`optimizer`] assigns members to open task slots.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod loader;
pub mod optimizer;
pub mod sync;

pub use error::{Error, Result};
