//! Shared fixtures for the kia_uvo integration tests

#![allow(dead_code)]

mod mock_api;

pub use mock_api::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ha_config_entries::{ConfigEntries, ConfigEntry, Storage};
use ha_core::dt::DEFAULT_TIME_ZONE;
use ha_service_registry::ServiceRegistry;
use kia_uvo::constants::*;
use kia_uvo::{register_services, EntryConfig, KiaUvo, KiaUvoEntry, VehicleApi};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Options that disable forcing entirely (start == finish)
pub fn never_force() -> HashMap<String, Value> {
    HashMap::from([
        (CONF_NO_FORCE_SCAN_HOUR_START.to_string(), json!(0)),
        (CONF_NO_FORCE_SCAN_HOUR_FINISH.to_string(), json!(0)),
    ])
}

pub fn credentials() -> HashMap<String, Value> {
    HashMap::from([
        (CONF_USERNAME.to_string(), json!("owner@example.com")),
        (CONF_PASSWORD.to_string(), json!("hunter2")),
    ])
}

/// Config entries, services and the integration wired to a [`MockApi`]
pub struct TestHost {
    pub dir: TempDir,
    pub storage: Arc<Storage>,
    pub entries: Arc<ConfigEntries>,
    pub services: Arc<ServiceRegistry>,
    pub integration: Arc<KiaUvo>,
    pub api: Arc<MockApi>,
}

impl TestHost {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(dir.path()));
        let entries = ConfigEntries::new(storage.clone());
        let api = Arc::new(MockApi::new());

        let factory_api = api.clone();
        let integration = Arc::new(KiaUvo::with_api_factory(
            DEFAULT_TIME_ZONE,
            Arc::new(
                move |_: &EntryConfig| -> kia_uvo::Result<Arc<dyn VehicleApi>> {
                    Ok(factory_api.clone() as Arc<dyn VehicleApi>)
                },
            ),
        ));
        entries.register_integration(integration.clone());

        let services = Arc::new(ServiceRegistry::new());
        register_services(&integration, &services);

        Self {
            dir,
            storage,
            entries,
            services,
            integration,
            api,
        }
    }

    /// Add an entry with the test credentials plus `data`
    pub async fn add_entry(
        &self,
        data: HashMap<String, Value>,
        options: HashMap<String, Value>,
    ) -> ConfigEntry {
        let mut all_data = credentials();
        all_data.extend(data);
        self.entries
            .add(
                ConfigEntry::new(DOMAIN, "Family EV6")
                    .with_unique_id("owner@example.com")
                    .with_data(all_data)
                    .with_options(options),
            )
            .await
            .unwrap()
    }

    /// A runtime for `entry` that is not driven by a timer
    pub fn runtime(&self, entry: &ConfigEntry) -> KiaUvoEntry {
        let config = EntryConfig::from_entry(entry, DEFAULT_TIME_ZONE).unwrap();
        KiaUvoEntry::new(
            entry,
            config,
            self.api.clone(),
            Arc::downgrade(&self.entries),
        )
    }

    /// `stored_credentials` as currently held by the manager
    pub fn stored_credentials(&self, entry_id: &str) -> Option<Value> {
        self.entries
            .get(entry_id)
            .and_then(|entry| entry.data.get(CONF_STORED_CREDENTIALS).cloned())
    }
}

/// Wait until `condition` holds, polling on the real clock
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Let spawned tasks run under a paused clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    DEFAULT_TIME_ZONE
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}
