//! Kia UVO vehicle integration
//!
//! Polls the Kia UVO EU cloud on a fixed interval and exposes the vehicle as
//! sensor, lock and climate entities. Each tick reads the status the cloud
//! holds; outside the configured silent hours, and when that status is older
//! than the force-scan interval, the tick also wakes the vehicle for fresh
//! data. Rotated tokens are written back into the config entry so restarts
//! skip the login.
//!
//! Host wiring:
//!
//! ```ignore
//! let integration = Arc::new(KiaUvo::new(time_zone));
//! entries.register_integration(integration.clone());
//! register_services(&integration, &services);
//! ```

pub mod api;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod integration;
pub mod platform;
pub mod polling;
pub mod services;
pub mod status;
pub mod token;
pub mod vehicle;

pub use api::{ClimateSettings, KiaUvoApi, LockAction, VehicleApi};
pub use config::{ConfigError, Credentials, DistanceUnit, EntryConfig};
pub use constants::DOMAIN;
pub use coordinator::KiaUvoEntry;
pub use error::{KiaUvoError, Result};
pub use integration::{ApiFactory, KiaUvo};
pub use platform::{Platform, PLATFORMS};
pub use polling::{ForceDecision, PollingPolicy, SilentHours};
pub use services::{register_services, CommandOutcome, VehicleCommand};
pub use status::{Distance, VehicleStatus};
pub use token::Token;
pub use vehicle::{Vehicle, VehicleSnapshot};
