//! In-memory stand-in for the vendor cloud

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kia_uvo::{
    ClimateSettings, Distance, DistanceUnit, KiaUvoError, LockAction, Token, VehicleApi,
    VehicleStatus,
};

/// Counts every call and serves a configurable vehicle status.
///
/// The cached status carries `status_time` as its vehicle-side timestamp. A
/// successful force update moves `status_time` to `forced_time`, the way the
/// vehicle would report fresh data.
pub struct MockApi {
    pub logins: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub cached_reads: AtomicUsize,
    pub force_updates: AtomicUsize,
    pub climate_starts: AtomicUsize,
    pub climate_stops: AtomicUsize,
    pub lock_actions: AtomicUsize,

    pub fail_login: AtomicBool,
    pub fail_refresh: AtomicBool,
    pub fail_cached: AtomicBool,
    pub fail_force: AtomicBool,

    status_time: Mutex<Option<DateTime<Utc>>>,
    forced_time: Mutex<Option<DateTime<Utc>>>,
    token_valid_until: Mutex<DateTime<Utc>>,
    cached_delay: Mutex<Option<Duration>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            logins: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            cached_reads: AtomicUsize::new(0),
            force_updates: AtomicUsize::new(0),
            climate_starts: AtomicUsize::new(0),
            climate_stops: AtomicUsize::new(0),
            lock_actions: AtomicUsize::new(0),
            fail_login: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            fail_cached: AtomicBool::new(false),
            fail_force: AtomicBool::new(false),
            status_time: Mutex::new(Some(Utc.with_ymd_and_hms(2024, 7, 15, 6, 0, 0).unwrap())),
            forced_time: Mutex::new(None),
            token_valid_until: Mutex::new(Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()),
            cached_delay: Mutex::new(None),
        }
    }

    pub fn set_status_time(&self, time: Option<DateTime<Utc>>) {
        *self.status_time.lock().unwrap() = time;
    }

    pub fn set_forced_time(&self, time: DateTime<Utc>) {
        *self.forced_time.lock().unwrap() = Some(time);
    }

    /// Expiry given to tokens issued from now on
    pub fn set_token_valid_until(&self, valid_until: DateTime<Utc>) {
        *self.token_valid_until.lock().unwrap() = valid_until;
    }

    /// Make every cached read take `delay` before it is counted
    pub fn set_cached_delay(&self, delay: Duration) {
        *self.cached_delay.lock().unwrap() = Some(delay);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn issue(&self, access_token: String) -> Token {
        Token {
            access_token,
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            device_id: "device-1".to_string(),
            vehicle_id: "vin-1".to_string(),
            vehicle_name: "Family EV6".to_string(),
            vehicle_model: "EV6".to_string(),
            valid_until: *self.token_valid_until.lock().unwrap(),
        }
    }
}

/// A token as a previous run would have stored it
pub fn stored_token(valid_until: DateTime<Utc>) -> Token {
    Token {
        access_token: "stored".to_string(),
        refresh_token: Some("refresh".to_string()),
        token_type: "Bearer".to_string(),
        device_id: "device-1".to_string(),
        vehicle_id: "vin-1".to_string(),
        vehicle_name: "Family EV6".to_string(),
        vehicle_model: "EV6".to_string(),
        valid_until,
    }
}

fn rejected(what: &str) -> KiaUvoError {
    KiaUvoError::Auth(format!("{} rejected", what))
}

#[async_trait]
impl VehicleApi for MockApi {
    async fn login(&self) -> kia_uvo::Result<Token> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(rejected("login"));
        }
        Ok(self.issue(format!("login-{}", n)))
    }

    async fn refresh_access_token(&self, _token: &Token) -> kia_uvo::Result<Token> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(rejected("refresh token"));
        }
        Ok(self.issue(format!("refreshed-{}", n)))
    }

    async fn get_cached_vehicle_status(&self, _token: &Token) -> kia_uvo::Result<VehicleStatus> {
        let delay = *self.cached_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.cached_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_cached.load(Ordering::SeqCst) {
            return Err(KiaUvoError::Api {
                status: 500,
                message: "cloud unavailable".to_string(),
            });
        }
        Ok(VehicleStatus {
            time: *self.status_time.lock().unwrap(),
            odometer: Some(Distance {
                value: 12345.0,
                unit: DistanceUnit::Kilometers,
            }),
            ev_battery_level: Some(80.0),
            range: Some(Distance {
                value: 320.0,
                unit: DistanceUnit::Kilometers,
            }),
            door_lock: Some(true),
            air_ctrl_on: false,
            engine: false,
            air_temp: Some(21.0),
        })
    }

    async fn update_vehicle_status(&self, _token: &Token) -> kia_uvo::Result<()> {
        self.force_updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_force.load(Ordering::SeqCst) {
            return Err(KiaUvoError::Api {
                status: 503,
                message: "vehicle did not answer".to_string(),
            });
        }
        if let Some(forced) = *self.forced_time.lock().unwrap() {
            self.set_status_time(Some(forced));
        }
        Ok(())
    }

    async fn start_climate(
        &self,
        _token: &Token,
        _settings: &ClimateSettings,
    ) -> kia_uvo::Result<()> {
        self.climate_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_climate(&self, _token: &Token) -> kia_uvo::Result<()> {
        self.climate_stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lock_action(&self, _token: &Token, _action: LockAction) -> kia_uvo::Result<()> {
        self.lock_actions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
