//! Door lock entity

use std::collections::HashMap;

use ha_core::{Context, State, STATE_UNKNOWN};

use super::{entity_state, Platform};
use crate::constants::{SERVICE_LOCK, SERVICE_UNLOCK};
use crate::services::VehicleCommand;
use crate::vehicle::VehicleSnapshot;

pub const STATE_LOCKED: &str = "locked";
pub const STATE_UNLOCKED: &str = "unlocked";

pub(crate) fn states(snapshot: &VehicleSnapshot, context: &Context) -> Vec<State> {
    let state = match snapshot.status.door_lock {
        Some(true) => STATE_LOCKED,
        Some(false) => STATE_UNLOCKED,
        None => STATE_UNKNOWN,
    };
    entity_state(
        Platform::Lock,
        snapshot,
        "door_lock",
        "Door Lock",
        state.to_string(),
        HashMap::new(),
        context,
    )
    .into_iter()
    .collect()
}

/// Entity services of the `lock` domain
pub const SERVICES: [&str; 2] = [SERVICE_LOCK, SERVICE_UNLOCK];

/// Command behind a `lock.*` entity service
pub fn command_for_service(service: &str) -> Option<VehicleCommand> {
    match service {
        SERVICE_LOCK => Some(VehicleCommand::Lock),
        SERVICE_UNLOCK => Some(VehicleCommand::Unlock),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test_support::snapshot;

    #[test]
    fn test_lock_state() {
        let mut snapshot = snapshot();
        assert_eq!(states(&snapshot, &Context::new())[0].state, STATE_LOCKED);

        snapshot.status.door_lock = Some(false);
        assert_eq!(states(&snapshot, &Context::new())[0].state, STATE_UNLOCKED);

        snapshot.status.door_lock = None;
        assert_eq!(states(&snapshot, &Context::new())[0].state, STATE_UNKNOWN);
    }

    #[test]
    fn test_lock_services() {
        assert_eq!(command_for_service("unlock"), Some(VehicleCommand::Unlock));
        assert_eq!(command_for_service("open"), None);
    }
}
