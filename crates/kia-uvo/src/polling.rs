//! Force-update policy
//!
//! A force update wakes the vehicle's modem to pull fresh data, which drains
//! the 12V battery. It is allowed only outside the configured silent hours
//! and only when the last vehicle-side update is older than the force-scan
//! interval.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Hours of the day during which no force update is sent.
///
/// The window is expressed as a start hour and a finish hour. A force is
/// permitted when `hour < start && hour >= finish`, which reads naturally for
/// a window crossing midnight (22 → 6). With `start <= finish` the condition
/// is never true and forcing is disabled entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilentHours {
    pub start: u32,
    pub finish: u32,
}

impl SilentHours {
    pub fn allows_force(&self, hour: u32) -> bool {
        hour < self.start && hour >= self.finish
    }
}

/// Outcome of the force-update decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceDecision {
    Force,
    /// Local time is inside the silent window
    SilentHours,
    /// The vehicle reported recently enough
    TooRecent,
}

impl ForceDecision {
    pub fn should_force(&self) -> bool {
        matches!(self, ForceDecision::Force)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub silent_hours: SilentHours,
    pub force_scan_interval: Duration,
}

impl PollingPolicy {
    pub fn new(silent_hours: SilentHours, force_scan_interval: Duration) -> Self {
        Self {
            silent_hours,
            force_scan_interval,
        }
    }

    /// Decide whether to force at local time `now`.
    ///
    /// `last_updated` is the vehicle-side timestamp of the current snapshot;
    /// `None` counts as infinitely stale.
    pub fn decide<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        last_updated: Option<DateTime<Utc>>,
    ) -> ForceDecision {
        if !self.silent_hours.allows_force(now.hour()) {
            return ForceDecision::SilentHours;
        }

        let Some(last_updated) = last_updated else {
            return ForceDecision::Force;
        };
        let elapsed = now.with_timezone(&Utc) - last_updated;
        let threshold = chrono::Duration::from_std(self.force_scan_interval)
            .unwrap_or(chrono::Duration::MAX);

        if elapsed > threshold {
            ForceDecision::Force
        } else {
            ForceDecision::TooRecent
        }
    }
}
