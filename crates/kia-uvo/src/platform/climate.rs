//! Air conditioner entity

use std::collections::HashMap;

use ha_core::{Context, State};
use serde_json::json;

use super::{entity_state, Platform};
use crate::constants::DEFAULT_CLIMATE_TEMPERATURE;
use crate::services::VehicleCommand;
use crate::vehicle::VehicleSnapshot;

pub const HVAC_MODE_HEAT_COOL: &str = "heat_cool";
pub const HVAC_MODE_OFF: &str = "off";

pub(crate) fn states(snapshot: &VehicleSnapshot, context: &Context) -> Vec<State> {
    let status = &snapshot.status;
    let mode = if status.air_ctrl_on {
        HVAC_MODE_HEAT_COOL
    } else {
        HVAC_MODE_OFF
    };
    let attributes = HashMap::from([
        (
            "hvac_modes".to_string(),
            json!([HVAC_MODE_HEAT_COOL, HVAC_MODE_OFF]),
        ),
        ("temperature".to_string(), json!(DEFAULT_CLIMATE_TEMPERATURE)),
        ("current_temperature".to_string(), json!(status.air_temp)),
        ("engine".to_string(), json!(status.engine)),
    ]);

    entity_state(
        Platform::Climate,
        snapshot,
        "air_conditioner",
        "Air Conditioner",
        mode.to_string(),
        attributes,
        context,
    )
    .into_iter()
    .collect()
}

/// Command for `climate.set_hvac_mode`
pub fn command_for_hvac_mode(mode: &str) -> Option<VehicleCommand> {
    match mode {
        HVAC_MODE_HEAT_COOL => Some(VehicleCommand::StartClimate),
        HVAC_MODE_OFF => Some(VehicleCommand::StopClimate),
        _ => None,
    }
}
