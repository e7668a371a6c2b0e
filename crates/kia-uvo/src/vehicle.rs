//! Vehicle state and token lifecycle

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ClimateSettings, LockAction, VehicleApi};
use crate::config::DistanceUnit;
use crate::error::{KiaUvoError, Result};
use crate::status::VehicleStatus;
use crate::token::Token;

/// What the entity platforms see after each update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: String,
    pub name: String,
    pub model: String,
    pub unit: DistanceUnit,
    pub status: VehicleStatus,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One vehicle of one config entry.
///
/// Holds the token and the last status read from the cloud. Every new status
/// is published on a watch channel for the entity platforms.
pub struct Vehicle {
    api: Arc<dyn VehicleApi>,
    token: Option<Token>,
    status: Option<VehicleStatus>,
    last_updated: Option<DateTime<Utc>>,
    unit: DistanceUnit,
    snapshots: watch::Sender<Option<VehicleSnapshot>>,
}

impl Vehicle {
    pub fn new(api: Arc<dyn VehicleApi>, token: Option<Token>, unit: DistanceUnit) -> Self {
        let (snapshots, _) = watch::channel(None);
        Self {
            api,
            token,
            status: None,
            last_updated: None,
            unit,
            snapshots,
        }
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn status(&self) -> Option<&VehicleStatus> {
        self.status.as_ref()
    }

    /// Vehicle-side timestamp of the current status
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<VehicleSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Option<VehicleSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Make sure a valid token is held, renewing it if missing or expired.
    ///
    /// Returns whether the token changed. A failed refresh-token grant falls
    /// back to a full login when the failure was an auth rejection.
    pub async fn refresh_token(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if let Some(token) = &self.token {
            if token.is_valid(now) {
                return Ok(false);
            }
        }

        let fresh = match &self.token {
            Some(expired) if expired.refresh_token.is_some() => {
                match self.api.refresh_access_token(expired).await {
                    Ok(token) => token,
                    Err(e) if e.is_auth() => {
                        warn!("Refresh token rejected, logging in again: {}", e);
                        self.api.login().await?
                    }
                    Err(e) => return Err(e),
                }
            }
            _ => {
                info!("No usable token, logging in");
                self.api.login().await?
            }
        };

        let changed = self.token.as_ref() != Some(&fresh);
        debug!(valid_until = %fresh.valid_until, changed, "Token refreshed");
        self.token = Some(fresh);
        Ok(changed)
    }

    fn require_token(&self) -> Result<&Token> {
        self.token.as_ref().ok_or(KiaUvoError::NotLoggedIn)
    }

    /// Read the status the cloud currently holds
    pub async fn update(&mut self) -> Result<()> {
        let token = self.require_token()?;
        let status = self.api.get_cached_vehicle_status(token).await?;

        match status.time {
            Some(time) => self.last_updated = Some(time),
            None => warn!("Vehicle status carries no timestamp, keeping previous"),
        }
        self.status = Some(status);
        self.publish();
        Ok(())
    }

    /// Wake the vehicle for fresh data, then read it back
    pub async fn force_update(&mut self) -> Result<()> {
        let token = self.require_token()?;
        self.api.update_vehicle_status(token).await?;
        self.update().await
    }

    pub async fn start_climate(&mut self, settings: &ClimateSettings) -> Result<()> {
        let token = self.require_token()?;
        self.api.start_climate(token, settings).await?;
        self.set_air_ctrl(true);
        Ok(())
    }

    pub async fn stop_climate(&mut self) -> Result<()> {
        let token = self.require_token()?;
        self.api.stop_climate(token).await?;
        self.set_air_ctrl(false);
        Ok(())
    }

    pub async fn lock_action(&mut self, action: LockAction) -> Result<()> {
        let token = self.require_token()?;
        self.api.lock_action(token, action).await?;
        if let Some(status) = self.status.as_mut() {
            status.door_lock = Some(action == LockAction::Lock);
        }
        self.publish();
        Ok(())
    }

    /// Commands are acknowledged before the vehicle reports back; reflect
    /// the requested state until the next update says otherwise
    fn set_air_ctrl(&mut self, on: bool) {
        if let Some(status) = self.status.as_mut() {
            status.air_ctrl_on = on;
        }
        self.publish();
    }

    fn publish(&self) {
        let (Some(token), Some(status)) = (&self.token, &self.status) else {
            return;
        };
        self.snapshots.send_replace(Some(VehicleSnapshot {
            vehicle_id: token.vehicle_id.clone(),
            name: token.vehicle_name.clone(),
            model: token.vehicle_model.clone(),
            unit: self.unit,
            status: status.clone(),
            last_updated: self.last_updated,
        }));
    }
}
