//! Vehicle status snapshot
//!
//! The vendor nests the interesting fields several levels deep; the wire
//! structs below mirror that shape and [`VehicleStatus::from_wire`] flattens
//! it into the snapshot the platforms read.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::DistanceUnit;

/// A distance reported by the vehicle, in the unit the vehicle chose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub value: f64,
    pub unit: DistanceUnit,
}

impl Distance {
    /// The distance expressed in `unit`
    pub fn in_unit(&self, unit: DistanceUnit) -> f64 {
        unit.convert(self.value, self.unit)
    }
}

/// Last known telemetry of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    /// When the vehicle itself produced this data
    pub time: Option<DateTime<Utc>>,
    pub odometer: Option<Distance>,
    pub ev_battery_level: Option<f64>,
    pub range: Option<Distance>,
    pub door_lock: Option<bool>,
    pub air_ctrl_on: bool,
    pub engine: bool,
    pub air_temp: Option<f64>,
}

impl VehicleStatus {
    pub(crate) fn from_wire(info: StatusInfo, tz: Tz) -> Self {
        let status = info.vehicle_status;
        let range = status
            .ev_status
            .as_ref()
            .and_then(|ev| ev.drv_distance.first())
            .and_then(|d| d.range_by_fuel.as_ref())
            .and_then(|r| r.total_available_range.as_ref())
            .and_then(WireValue::distance);

        Self {
            time: status
                .time
                .as_deref()
                .and_then(|t| ha_core::dt::parse_compact_local(t, tz)),
            odometer: info.odometer.as_ref().and_then(WireValue::distance),
            ev_battery_level: status.ev_status.as_ref().and_then(|ev| ev.battery_status),
            range,
            door_lock: status.door_lock,
            air_ctrl_on: status.air_ctrl_on.unwrap_or(false),
            engine: status.engine.unwrap_or(false),
            air_temp: status.air_temp.as_ref().and_then(|t| t.celsius()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusEnvelope {
    pub res_msg: StatusResMsg,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusResMsg {
    /// `status/latest` wraps the status with the odometer
    #[serde(default)]
    pub vehicle_status_info: Option<StatusInfo>,
    /// a forced `status` call returns the bare vehicle status; every field
    /// is optional, so only a timestamped one counts
    #[serde(flatten)]
    pub bare: Option<WireVehicleStatus>,
}

impl StatusResMsg {
    pub fn into_info(self) -> Option<StatusInfo> {
        match (self.vehicle_status_info, self.bare) {
            (Some(info), _) => Some(info),
            (None, Some(bare)) if bare.time.is_some() => Some(StatusInfo {
                vehicle_status: bare,
                odometer: None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusInfo {
    pub vehicle_status: WireVehicleStatus,
    #[serde(default)]
    pub odometer: Option<WireValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireVehicleStatus {
    pub time: Option<String>,
    pub air_ctrl_on: Option<bool>,
    pub engine: Option<bool>,
    pub door_lock: Option<bool>,
    pub air_temp: Option<WireTemperature>,
    pub ev_status: Option<WireEvStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireEvStatus {
    pub battery_status: Option<f64>,
    #[serde(default)]
    pub drv_distance: Vec<WireDriveDistance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDriveDistance {
    pub range_by_fuel: Option<WireRangeByFuel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRangeByFuel {
    pub total_available_range: Option<WireValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireValue {
    pub value: f64,
    pub unit: i64,
}

impl WireValue {
    fn distance(&self) -> Option<Distance> {
        Some(Distance {
            value: self.value,
            unit: DistanceUnit::from_code(self.unit)?,
        })
    }
}

/// Temperatures come back as a hex code in half degrees above 14 °C
#[derive(Debug, Deserialize)]
pub(crate) struct WireTemperature {
    pub value: String,
}

impl WireTemperature {
    fn celsius(&self) -> Option<f64> {
        let code = self.value.trim_end_matches('H');
        let steps = u8::from_str_radix(code, 16).ok()?;
        Some(14.0 + f64::from(steps) * 0.5)
    }
}

/// Encode a target temperature in the vendor's half-degree hex code
pub(crate) fn temperature_code(celsius: f64) -> String {
    let steps = ((celsius.clamp(14.0, 30.0) - 14.0) * 2.0).round() as u8;
    format!("{:02X}H", steps)
}
