//! The `kia_uvo` integration
//!
//! Sets up one [`KiaUvoEntry`] per config entry: runs a first update cycle,
//! arms the scan-interval timer and subscribes to entry updates. Unload
//! undoes all three.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono_tz::Tz;
use dashmap::DashMap;
use futures::future::BoxFuture;
use ha_config_entries::{ConfigEntries, ConfigEntry, Integration, ListenerId, UpdateListener};
use ha_core::{Context, State};
use ha_helpers::{track_time_interval, IntervalListener};
use tracing::{debug, error, info};

use crate::api::{KiaUvoApi, VehicleApi};
use crate::config::EntryConfig;
use crate::constants::DOMAIN;
use crate::coordinator::KiaUvoEntry;
use crate::error::Result;

/// Builds the API client for an entry
pub type ApiFactory = Arc<dyn Fn(&EntryConfig) -> Result<Arc<dyn VehicleApi>> + Send + Sync>;

struct LoadedEntry {
    runtime: Arc<KiaUvoEntry>,
    timer: IntervalListener,
    update_listener: ListenerId,
    entries: Weak<ConfigEntries>,
}

pub struct KiaUvo {
    default_time_zone: Tz,
    api_factory: ApiFactory,
    loaded: DashMap<String, LoadedEntry>,
}

impl KiaUvo {
    /// Integration talking to the vendor cloud
    pub fn new(default_time_zone: Tz) -> Self {
        Self::with_api_factory(
            default_time_zone,
            Arc::new(|config: &EntryConfig| -> Result<Arc<dyn VehicleApi>> {
                let api = KiaUvoApi::new(config.credentials.clone(), config.time_zone)?;
                Ok(Arc::new(api) as Arc<dyn VehicleApi>)
            }),
        )
    }

    pub fn with_api_factory(default_time_zone: Tz, api_factory: ApiFactory) -> Self {
        Self {
            default_time_zone,
            api_factory,
            loaded: DashMap::new(),
        }
    }

    pub fn entry(&self, entry_id: &str) -> Option<Arc<KiaUvoEntry>> {
        self.loaded.get(entry_id).map(|l| l.runtime.clone())
    }

    pub fn loaded_entries(&self) -> Vec<Arc<KiaUvoEntry>> {
        self.loaded.iter().map(|l| l.runtime.clone()).collect()
    }

    /// States of every entity of every loaded entry
    pub fn entity_states(&self, context: &Context) -> Vec<State> {
        self.loaded
            .iter()
            .flat_map(|l| l.runtime.entity_states(context))
            .collect()
    }

    /// Whether the entry's scan timer is still running
    pub fn is_polling(&self, entry_id: &str) -> bool {
        self.loaded
            .get(entry_id)
            .map(|l| l.timer.is_active())
            .unwrap_or(false)
    }
}

/// Reload the entry after every update, stored credentials included
fn reload_on_update(entries: Weak<ConfigEntries>) -> UpdateListener {
    Arc::new(move |updated: ConfigEntry| {
        let entries = entries.clone();
        Box::pin(async move {
            let Some(entries) = entries.upgrade() else {
                return;
            };
            info!(entry_id = %updated.entry_id, "Entry updated, reloading");
            if let Err(e) = entries.reload(&updated.entry_id).await {
                error!(entry_id = %updated.entry_id, "Reload failed: {}", e);
            }
        }) as BoxFuture<'static, ()>
    })
}

#[async_trait]
impl Integration for KiaUvo {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup_entry(
        &self,
        entries: Arc<ConfigEntries>,
        entry: &ConfigEntry,
    ) -> std::result::Result<(), String> {
        debug!(entry_id = %entry.entry_id, "Setting up {}", DOMAIN);
        let config =
            EntryConfig::from_entry(entry, self.default_time_zone).map_err(|e| e.to_string())?;
        let api = (self.api_factory)(&config).map_err(|e| e.to_string())?;
        let scan_interval = config.scan_interval;

        let runtime = Arc::new(KiaUvoEntry::new(
            entry,
            config,
            api,
            Arc::downgrade(&entries),
        ));
        runtime
            .update_cycle(ha_core::dt::utcnow())
            .await
            .map_err(|e| format!("initial update failed: {}", e))?;

        let tick = runtime.clone();
        let timer = track_time_interval(scan_interval, move |now| {
            let runtime = tick.clone();
            async move {
                if let Err(e) = runtime.update_cycle(now).await {
                    error!(entry_id = %runtime.entry_id(), "Update failed: {}", e);
                }
            }
        });

        let update_listener = entries.add_update_listener(
            &entry.entry_id,
            reload_on_update(Arc::downgrade(&entries)),
        );

        self.loaded.insert(
            entry.entry_id.clone(),
            LoadedEntry {
                runtime,
                timer,
                update_listener,
                entries: Arc::downgrade(&entries),
            },
        );
        info!(entry_id = %entry.entry_id, interval = ?scan_interval, "Polling vehicle");
        Ok(())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> bool {
        let Some((_, loaded)) = self.loaded.remove(&entry.entry_id) else {
            debug!(entry_id = %entry.entry_id, "Entry was not set up");
            return true;
        };

        // A tick that triggered this unload finishes before the timer goes
        loaded.runtime.when_idle(|| loaded.timer.cancel()).await;
        if let Some(entries) = loaded.entries.upgrade() {
            entries.remove_update_listener(&entry.entry_id, loaded.update_listener);
        }
        true
    }
}
