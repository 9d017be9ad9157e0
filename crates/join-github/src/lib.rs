//! Organisation admission for the Join GitHub service.
//!
//! The [`admission`] module decides whether a candidate may be invited into
//! the managed GitHub organisations automatically, must be reviewed by a
//! person, or must be turned away, and then carries out the invitations.

pub mod admission;
pub mod config;
pub mod error;
pub mod telemetry;
