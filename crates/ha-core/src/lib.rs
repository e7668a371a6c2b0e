//! Core host types
//!
//! This crate provides the fundamental types shared between the host crates
//! and the integrations they load: Context, ServiceCall, EntityId, State,
//! and the `dt` time helpers.

mod context;
pub mod dt;
mod entity_id;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use service_call::{ServiceCall, SupportsResponse};
pub use state::State;

/// State value for an entity whose value is not known yet
pub const STATE_UNKNOWN: &str = "unknown";
