//! Entity platforms
//!
//! Each platform turns a [`VehicleSnapshot`] into the states of its
//! entities. Entity ids follow `<platform>.<vehicle>_<key>`.

pub mod climate;
pub mod lock;
pub mod sensor;

use std::collections::HashMap;

use ha_core::{slugify, Context, EntityId, State};
use serde_json::Value;
use tracing::warn;

use crate::vehicle::VehicleSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Sensor,
    Lock,
    Climate,
}

pub const PLATFORMS: [Platform; 3] = [Platform::Sensor, Platform::Lock, Platform::Climate];

impl Platform {
    pub fn domain(&self) -> &'static str {
        match self {
            Platform::Sensor => "sensor",
            Platform::Lock => "lock",
            Platform::Climate => "climate",
        }
    }

    pub fn states(&self, snapshot: &VehicleSnapshot, context: &Context) -> Vec<State> {
        match self {
            Platform::Sensor => sensor::states(snapshot, context),
            Platform::Lock => lock::states(snapshot, context),
            Platform::Climate => climate::states(snapshot, context),
        }
    }
}

/// States of every entity on every platform
pub fn entity_states(snapshot: &VehicleSnapshot, context: &Context) -> Vec<State> {
    PLATFORMS
        .iter()
        .flat_map(|platform| platform.states(snapshot, context))
        .collect()
}

fn vehicle_slug(snapshot: &VehicleSnapshot) -> String {
    [&snapshot.name, &snapshot.model, &snapshot.vehicle_id]
        .into_iter()
        .map(|text| slugify(text))
        .find(|slug| !slug.is_empty())
        .unwrap_or_else(|| "vehicle".to_string())
}

/// Build one entity state; `None` when the id cannot be formed
pub(crate) fn entity_state(
    platform: Platform,
    snapshot: &VehicleSnapshot,
    key: &str,
    friendly_suffix: &str,
    state: String,
    mut attributes: HashMap<String, Value>,
    context: &Context,
) -> Option<State> {
    let object_id = format!("{}_{}", vehicle_slug(snapshot), key);
    let entity_id = match EntityId::new(platform.domain(), object_id) {
        Ok(entity_id) => entity_id,
        Err(e) => {
            warn!("Skipping {} entity '{}': {}", platform.domain(), key, e);
            return None;
        }
    };

    let display_name = if snapshot.name.is_empty() {
        snapshot.model.as_str()
    } else {
        snapshot.name.as_str()
    };
    attributes.insert(
        "friendly_name".to_string(),
        Value::from(format!("{} {}", display_name, friendly_suffix).trim().to_string()),
    );
    Some(State::new(entity_id, state, attributes, context.clone()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_use_vehicle_slug() {
        let states = entity_states(&test_support::snapshot(), &Context::new());
        let ids: Vec<String> = states.iter().map(|s| s.entity_id.to_string()).collect();

        assert!(ids.contains(&"sensor.family_ev6_odometer".to_string()));
        assert!(ids.contains(&"lock.family_ev6_door_lock".to_string()));
        assert!(ids.contains(&"climate.family_ev6_air_conditioner".to_string()));
    }

    #[test]
    fn test_slug_falls_back_to_model() {
        let mut snapshot = test_support::snapshot();
        snapshot.name = "***".to_string();
        assert_eq!(vehicle_slug(&snapshot), "ev6");
    }
}
