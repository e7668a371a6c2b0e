//! Integration services
//!
//! `kia_uvo.force_update`, `kia_uvo.update`, `kia_uvo.start_climate` and
//! `kia_uvo.stop_climate` take no data. Each call runs the command against
//! every loaded entry and, when asked for a response, answers with one
//! [`CommandOutcome`] per entry.
//!
//! The entity services `lock.lock`, `lock.unlock` and
//! `climate.set_hvac_mode` accept an optional `entity_id` (one id or a list)
//! and run against the entries owning those entities.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ha_core::{ServiceCall, SupportsResponse};
use serde_json::Value;
use ha_service_registry::{ServiceError, ServiceRegistry, ServiceResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::*;
use crate::coordinator::KiaUvoEntry;
use crate::integration::KiaUvo;
use crate::platform::{climate, lock, Platform};

/// An action run against one entry's vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCommand {
    ForceUpdate,
    Update,
    StartClimate,
    StopClimate,
    Lock,
    Unlock,
}

impl VehicleCommand {
    /// Commands exposed as domain services
    pub const SERVICES: [VehicleCommand; 4] = [
        VehicleCommand::ForceUpdate,
        VehicleCommand::Update,
        VehicleCommand::StartClimate,
        VehicleCommand::StopClimate,
    ];

    pub const ALL: [VehicleCommand; 6] = [
        VehicleCommand::ForceUpdate,
        VehicleCommand::Update,
        VehicleCommand::StartClimate,
        VehicleCommand::StopClimate,
        VehicleCommand::Lock,
        VehicleCommand::Unlock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VehicleCommand::ForceUpdate => SERVICE_FORCE_UPDATE,
            VehicleCommand::Update => SERVICE_UPDATE,
            VehicleCommand::StartClimate => SERVICE_START_CLIMATE,
            VehicleCommand::StopClimate => SERVICE_STOP_CLIMATE,
            VehicleCommand::Lock => SERVICE_LOCK,
            VehicleCommand::Unlock => SERVICE_UNLOCK,
        }
    }
}

impl fmt::Display for VehicleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VehicleCommand {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| ServiceError::InvalidData(format!("unknown command '{}'", s)))
    }
}

/// Result of a command on one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub entry_id: String,
    pub command: VehicleCommand,
    /// Vehicle-side timestamp after the command ran
    pub last_updated: Option<DateTime<Utc>>,
}

/// Register the domain services and the entity services, dispatching to
/// `integration`'s loaded entries
pub fn register_services(integration: &Arc<KiaUvo>, registry: &ServiceRegistry) {
    for command in VehicleCommand::SERVICES {
        let integration = integration.clone();
        registry.register(
            DOMAIN,
            command.name(),
            move |call: ServiceCall| {
                let integration = integration.clone();
                async move { dispatch(&integration, command, call).await }
            },
            SupportsResponse::Optional,
        );
    }
    register_entity_services(integration, registry);
    info!("Registered {} services", DOMAIN);
}

fn register_entity_services(integration: &Arc<KiaUvo>, registry: &ServiceRegistry) {
    for service in lock::SERVICES {
        let integration = integration.clone();
        registry.register(
            Platform::Lock.domain(),
            service,
            move |call: ServiceCall| {
                let integration = integration.clone();
                async move {
                    let command = lock::command_for_service(&call.service).ok_or_else(|| {
                        ServiceError::InvalidData(format!("unknown service {}", call.service_id()))
                    })?;
                    dispatch_to_entities(&integration, Platform::Lock, command, call).await
                }
            },
            SupportsResponse::Optional,
        );
    }

    let integration = integration.clone();
    registry.register(
        Platform::Climate.domain(),
        SERVICE_SET_HVAC_MODE,
        move |call: ServiceCall| {
            let integration = integration.clone();
            async move {
                let mode: String = call.get(ATTR_HVAC_MODE).ok_or_else(|| {
                    ServiceError::InvalidData(format!("{} is required", ATTR_HVAC_MODE))
                })?;
                let command = climate::command_for_hvac_mode(&mode).ok_or_else(|| {
                    ServiceError::InvalidData(format!("unsupported hvac mode '{}'", mode))
                })?;
                dispatch_to_entities(&integration, Platform::Climate, command, call).await
            }
        },
        SupportsResponse::Optional,
    );
}

async fn dispatch(
    integration: &KiaUvo,
    command: VehicleCommand,
    call: ServiceCall,
) -> ServiceResult {
    let runtimes = integration.loaded_entries();
    if runtimes.is_empty() {
        return Err(ServiceError::CallFailed(format!(
            "no {} entry is loaded",
            DOMAIN
        )));
    }
    run(runtimes, command, &call).await
}

/// Entity ids named by the call; `None` targets every entity
fn target_entities(call: &ServiceCall) -> Result<Option<Vec<String>>, ServiceError> {
    match call.service_data.get(ATTR_ENTITY_ID) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(entity_id)) => Ok(Some(vec![entity_id.clone()])),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| {
                ServiceError::InvalidData(format!(
                    "{} must be an entity id or a list of them",
                    ATTR_ENTITY_ID
                ))
            }),
    }
}

async fn dispatch_to_entities(
    integration: &KiaUvo,
    platform: Platform,
    command: VehicleCommand,
    call: ServiceCall,
) -> ServiceResult {
    let targets = target_entities(&call)?;
    let runtimes: Vec<_> = integration
        .loaded_entries()
        .into_iter()
        .filter(|runtime| match &targets {
            None => true,
            Some(targets) => runtime
                .entity_states(&call.context)
                .iter()
                .filter(|state| state.entity_id.domain() == platform.domain())
                .any(|state| targets.contains(&state.entity_id.to_string())),
        })
        .collect();

    if runtimes.is_empty() {
        return Err(ServiceError::CallFailed(format!(
            "no {} entity matches {}",
            platform.domain(),
            call.service_id()
        )));
    }
    run(runtimes, command, &call).await
}

async fn run(
    runtimes: Vec<Arc<KiaUvoEntry>>,
    command: VehicleCommand,
    call: &ServiceCall,
) -> ServiceResult {
    let now = ha_core::dt::utcnow();
    let mut outcomes = Vec::with_capacity(runtimes.len());
    let mut failures = Vec::new();
    for runtime in runtimes {
        match runtime.execute(command, now).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!(
                    entry_id = %runtime.entry_id(),
                    context = %call.context.id,
                    "{} failed: {}",
                    call.service_id(),
                    e
                );
                failures.push(format!("{}: {}", runtime.entry_id(), e));
            }
        }
    }

    if !failures.is_empty() {
        return Err(ServiceError::CallFailed(failures.join("; ")));
    }
    serde_json::to_value(outcomes)
        .map(Some)
        .map_err(|e| ServiceError::CallFailed(e.to_string()))
}
