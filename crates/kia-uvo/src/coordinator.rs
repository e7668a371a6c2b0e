//! Per-entry runtime
//!
//! A [`KiaUvoEntry`] exists from entry setup to unload. It owns the entry's
//! vehicle behind a mutex, so timer ticks and manual service calls for the
//! same entry never interleave.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use ha_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntryUpdate};
use ha_core::{Context, State};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument};

use crate::api::{ClimateSettings, LockAction, VehicleApi};
use crate::config::EntryConfig;
use crate::constants::CONF_STORED_CREDENTIALS;
use crate::error::Result;
use crate::platform;
use crate::polling::ForceDecision;
use crate::services::{CommandOutcome, VehicleCommand};
use crate::vehicle::{Vehicle, VehicleSnapshot};

pub struct KiaUvoEntry {
    entry_id: String,
    config: EntryConfig,
    entries: Weak<ConfigEntries>,
    vehicle: Mutex<Vehicle>,
    snapshots: watch::Receiver<Option<VehicleSnapshot>>,
}

impl KiaUvoEntry {
    pub fn new(
        entry: &ConfigEntry,
        config: EntryConfig,
        api: Arc<dyn VehicleApi>,
        entries: Weak<ConfigEntries>,
    ) -> Self {
        let vehicle = Vehicle::new(api, config.stored_token.clone(), config.unit);
        let snapshots = vehicle.subscribe();
        Self {
            entry_id: entry.entry_id.clone(),
            config,
            entries,
            vehicle: Mutex::new(vehicle),
            snapshots,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// Vehicle-side timestamp of the latest snapshot
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.snapshots
            .borrow()
            .as_ref()
            .and_then(|snapshot| snapshot.last_updated)
    }

    pub fn snapshot(&self) -> Option<VehicleSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every vehicle update
    pub fn subscribe(&self) -> watch::Receiver<Option<VehicleSnapshot>> {
        self.snapshots.clone()
    }

    /// Wait for the running cycle or command to finish, then run `f` before
    /// another one can start
    pub(crate) async fn when_idle<R>(&self, f: impl FnOnce() -> R) -> R {
        let _vehicle = self.vehicle.lock().await;
        f()
    }

    /// Entity states derived from the latest snapshot
    pub fn entity_states(&self, context: &Context) -> Vec<State> {
        match self.snapshots.borrow().as_ref() {
            Some(snapshot) => platform::entity_states(snapshot, context),
            None => Vec::new(),
        }
    }

    /// Renew the token if needed and write a rotated token back into the
    /// entry's `stored_credentials`
    async fn refresh_config_entry(
        &self,
        vehicle: &mut Vehicle,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !vehicle.refresh_token(now).await? {
            return Ok(());
        }
        let Some(token) = vehicle.token() else {
            return Ok(());
        };
        let Some(entries) = self.entries.upgrade() else {
            debug!(entry_id = %self.entry_id, "Config entries gone, token not persisted");
            return Ok(());
        };

        let entry = entries
            .get(&self.entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(self.entry_id.clone()))?;
        let mut data = entry.data;
        data.insert(CONF_STORED_CREDENTIALS.to_string(), token.to_stored());
        entries
            .update(&self.entry_id, ConfigEntryUpdate::new().data(data))
            .await?;
        info!(entry_id = %self.entry_id, "Stored refreshed credentials");
        Ok(())
    }

    /// One scheduled cycle: refresh the token, read the cached status, then
    /// force a vehicle-side refresh if the policy allows it.
    ///
    /// Token and cached-update failures are returned. A force failure is
    /// logged and the cycle still succeeds.
    #[instrument(skip(self), fields(entry_id = %self.entry_id))]
    pub async fn update_cycle(&self, event_time: DateTime<Utc>) -> Result<ForceDecision> {
        let mut vehicle = self.vehicle.lock().await;
        self.refresh_config_entry(&mut vehicle, event_time).await?;
        vehicle.update().await?;

        let local = ha_core::dt::as_local(event_time, self.config.time_zone);
        let decision = self
            .config
            .polling_policy()
            .decide(&local, vehicle.last_updated());
        debug!(
            hour = %local.format("%H"),
            start = self.config.silent_hours.start,
            finish = self.config.silent_hours.finish,
            force_scan_interval = ?self.config.force_scan_interval,
            ?decision,
            "Force update decision"
        );

        if decision.should_force() {
            if let Err(e) = vehicle.force_update().await {
                error!("Force update failed: {}", e);
            }
        }
        Ok(decision)
    }

    /// Run one command, renewing the token first
    pub async fn execute(
        &self,
        command: VehicleCommand,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome> {
        let mut vehicle = self.vehicle.lock().await;
        self.refresh_config_entry(&mut vehicle, now).await?;

        match command {
            VehicleCommand::ForceUpdate => vehicle.force_update().await?,
            VehicleCommand::Update => vehicle.update().await?,
            VehicleCommand::StartClimate => {
                vehicle.start_climate(&ClimateSettings::default()).await?
            }
            VehicleCommand::StopClimate => vehicle.stop_climate().await?,
            VehicleCommand::Lock => vehicle.lock_action(LockAction::Lock).await?,
            VehicleCommand::Unlock => vehicle.lock_action(LockAction::Unlock).await?,
        }
        debug!(entry_id = %self.entry_id, %command, "Command completed");

        Ok(CommandOutcome {
            entry_id: self.entry_id.clone(),
            command,
            last_updated: vehicle.last_updated(),
        })
    }
}
