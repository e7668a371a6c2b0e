//! Sensor entities: odometer, EV battery, driving range, last update

use std::collections::HashMap;

use ha_core::{Context, State, STATE_UNKNOWN};
use serde_json::{json, Value};

use super::{entity_state, Platform};
use crate::status::Distance;
use crate::vehicle::VehicleSnapshot;

fn attributes(unit: Option<&str>, device_class: &str) -> HashMap<String, Value> {
    let mut attributes = HashMap::from([("device_class".to_string(), json!(device_class))]);
    if let Some(unit) = unit {
        attributes.insert("unit_of_measurement".to_string(), json!(unit));
    }
    attributes
}

fn distance_state(distance: Option<&Distance>, snapshot: &VehicleSnapshot) -> String {
    match distance {
        Some(distance) => format!("{:.1}", distance.in_unit(snapshot.unit)),
        None => STATE_UNKNOWN.to_string(),
    }
}

pub(crate) fn states(snapshot: &VehicleSnapshot, context: &Context) -> Vec<State> {
    let status = &snapshot.status;
    let unit = snapshot.unit.symbol();

    let sensors = [
        (
            "odometer",
            "Odometer",
            distance_state(status.odometer.as_ref(), snapshot),
            attributes(Some(unit), "distance"),
        ),
        (
            "ev_battery_level",
            "EV Battery",
            status
                .ev_battery_level
                .map(|level| format!("{:.0}", level))
                .unwrap_or_else(|| STATE_UNKNOWN.to_string()),
            attributes(Some("%"), "battery"),
        ),
        (
            "range",
            "Range",
            distance_state(status.range.as_ref(), snapshot),
            attributes(Some(unit), "distance"),
        ),
        (
            "last_updated",
            "Last Updated",
            snapshot
                .last_updated
                .map(|time| time.to_rfc3339())
                .unwrap_or_else(|| STATE_UNKNOWN.to_string()),
            attributes(None, "timestamp"),
        ),
    ];

    sensors
        .into_iter()
        .filter_map(|(key, name, state, attributes)| {
            entity_state(Platform::Sensor, snapshot, key, name, state, attributes, context)
        })
        .collect()
}
