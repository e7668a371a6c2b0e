//! Integration constants: option keys, defaults and vendor endpoints

/// Integration domain
pub const DOMAIN: &str = "kia_uvo";

pub const CONF_USERNAME: &str = "username";
pub const CONF_PASSWORD: &str = "password";
pub const CONF_STORED_CREDENTIALS: &str = "stored_credentials";
pub const CONF_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
pub const CONF_SCAN_INTERVAL: &str = "scan_interval";
pub const CONF_FORCE_SCAN_INTERVAL: &str = "force_scan_interval";
pub const CONF_NO_FORCE_SCAN_HOUR_START: &str = "no_force_scan_hour_start";
pub const CONF_NO_FORCE_SCAN_HOUR_FINISH: &str = "no_force_scan_hour_finish";
pub const CONF_TIME_ZONE: &str = "time_zone";

/// Minutes between regular (cached) updates
pub const DEFAULT_SCAN_INTERVAL: u64 = 30;
/// Minimum minutes between forced vehicle-side updates
pub const DEFAULT_FORCE_SCAN_INTERVAL: u64 = 240;
/// Silent window start hour (inclusive)
pub const DEFAULT_NO_FORCE_SCAN_HOUR_START: u32 = 22;
/// Silent window finish hour (exclusive)
pub const DEFAULT_NO_FORCE_SCAN_HOUR_FINISH: u32 = 6;

pub const SERVICE_FORCE_UPDATE: &str = "force_update";
pub const SERVICE_UPDATE: &str = "update";
pub const SERVICE_START_CLIMATE: &str = "start_climate";
pub const SERVICE_STOP_CLIMATE: &str = "stop_climate";

/// Entity services of the lock and climate platforms
pub const SERVICE_LOCK: &str = "lock";
pub const SERVICE_UNLOCK: &str = "unlock";
pub const SERVICE_SET_HVAC_MODE: &str = "set_hvac_mode";

pub const ATTR_ENTITY_ID: &str = "entity_id";
pub const ATTR_HVAC_MODE: &str = "hvac_mode";

pub const BASE_URL: &str = "https://prd.eu-ccapi.kia.com:8080";
pub const CLIENT_ID: &str = "fdc85c00-0a2f-4c64-bcb4-2cfb1500730a";
pub const CLIENT_SECRET: &str = "secret";
pub const REDIRECT_PATH: &str = "/api/v1/user/oauth2/redirect";
pub const USER_AGENT: &str = "okhttp/3.10.0";

/// Tokens are treated as expired this many seconds before the server says so
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Cabin temperature requested by `start_climate` when none is given (°C)
pub const DEFAULT_CLIMATE_TEMPERATURE: f64 = 21.0;
