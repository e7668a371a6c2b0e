//! Helpers for integrations
//!
//! - [`event`] - periodic callbacks with cancellable handles

pub mod event;

pub use event::{track_time_interval, IntervalListener};
