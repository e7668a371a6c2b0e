//! Home Assistant Rust Server
//!
//! Loads `configuration.yaml` and the stored config entries, imports the
//! `kia_uvo:` section as a config entry and runs the integration until
//! Ctrl-C.

mod config;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono_tz::Tz;
use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntrySource, ConfigEntryUpdate, Storage};
use ha_core::{Context, State};
use ha_service_registry::ServiceRegistry;
use kia_uvo::constants::{CONF_PASSWORD, CONF_USERNAME, DOMAIN};
use kia_uvo::{register_services, KiaUvo};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{HostConfig, KiaUvoConfig};

/// The central Home Assistant instance
pub struct HomeAssistant {
    pub config_dir: PathBuf,
    pub time_zone: Tz,
    /// Service registry for service calls
    pub services: Arc<ServiceRegistry>,
    pub config_entries: Arc<ConfigEntries>,
    pub kia_uvo: Arc<KiaUvo>,
}

impl HomeAssistant {
    /// Create an instance and load its stored config entries
    pub async fn new(config_dir: PathBuf, time_zone: Tz) -> Result<Self> {
        let storage = Arc::new(Storage::new(&config_dir));
        let config_entries = ConfigEntries::new(storage);
        config_entries
            .load()
            .await
            .context("loading config entries")?;

        Ok(Self {
            config_dir,
            time_zone,
            services: Arc::new(ServiceRegistry::new()),
            config_entries,
            kia_uvo: Arc::new(KiaUvo::new(time_zone)),
        })
    }

    /// Register the integration, its services and its entity services
    pub fn register_kia_uvo(&self) {
        self.config_entries
            .register_integration(self.kia_uvo.clone());
        register_services(&self.kia_uvo, &self.services);
    }

    /// Current states of the vehicle entities
    pub fn states(&self) -> Vec<State> {
        self.kia_uvo.entity_states(&Context::new())
    }

    /// Create or refresh the entry described by the `kia_uvo:` section.
    ///
    /// The entry is keyed by username. Data the integration stored itself
    /// (the token) is kept.
    pub async fn import_kia_uvo(&self, config: &KiaUvoConfig) -> Result<()> {
        let credentials = [
            (CONF_USERNAME.to_string(), json!(config.username)),
            (CONF_PASSWORD.to_string(), json!(config.password)),
        ];

        match self
            .config_entries
            .get_by_unique_id(DOMAIN, &config.username)
        {
            Some(existing) => {
                let mut data = existing.data.clone();
                data.extend(credentials);
                self.config_entries
                    .update(
                        &existing.entry_id,
                        ConfigEntryUpdate::new()
                            .data(data)
                            .options(config.options.clone()),
                    )
                    .await?;
            }
            None => {
                let entry = ConfigEntry::new(DOMAIN, config.username.clone())
                    .with_unique_id(config.username.clone())
                    .with_source(ConfigEntrySource::Import)
                    .with_data(HashMap::<String, Value>::from(credentials))
                    .with_options(config.options.clone());
                let entry = self.config_entries.add(entry).await?;
                info!("Imported {} entry {}", DOMAIN, entry.entry_id);
            }
        }
        Ok(())
    }

    /// Set up every stored entry; failures are logged, not fatal
    pub async fn start(&self) {
        for result in self.config_entries.setup_all().await {
            if let Err(e) = result {
                error!("Entry setup failed: {}", e);
            }
        }
    }

    pub async fn stop(&self) {
        for result in self.config_entries.unload_all().await {
            if let Err(e) = result {
                warn!("Entry unload failed: {}", e);
            }
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));
    info!("Starting Home Assistant (Rust) from {}", config_dir.display());

    let config = HostConfig::load(&config_dir)?;
    let time_zone = ha_core::dt::parse_time_zone(&config.homeassistant.time_zone)?;

    let hass = HomeAssistant::new(config_dir, time_zone).await?;
    hass.register_kia_uvo();
    if let Some(kia_uvo) = &config.kia_uvo {
        hass.import_kia_uvo(kia_uvo).await?;
    }

    hass.start().await;
    for state in hass.states() {
        info!(entity_id = %state.entity_id, state = %state.state, "Entity ready");
    }
    info!(
        "Home Assistant is running ({} config entries in {})",
        hass.config_entries.len(),
        hass.config_dir.display()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    hass.stop().await;

    Ok(())
}
