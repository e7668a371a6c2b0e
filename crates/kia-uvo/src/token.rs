//! Access token and vehicle identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Credentials issued at login, plus the vehicle they were used to discover.
///
/// Serialized as-is into the entry's `stored_credentials` so a restart can
/// reuse a still-valid token instead of logging in again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Client device id sent as `ccsp-device-id`
    pub device_id: String,
    pub vehicle_id: String,
    #[serde(default)]
    pub vehicle_name: String,
    #[serde(default)]
    pub vehicle_model: String,
    pub valid_until: DateTime<Utc>,
}

impl Token {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    /// Value of the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    pub fn from_stored(value: &Value) -> Result<Self, serde_json::Error> {
        Token::deserialize(value)
    }

    pub fn to_stored(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn token() -> Token {
        Token {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            device_id: "device".to_string(),
            vehicle_id: "vin-1".to_string(),
            vehicle_name: "EV6".to_string(),
            vehicle_model: "EV6 GT".to_string(),
            valid_until: Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_validity_is_exclusive_of_expiry() {
        let token = token();
        assert!(token.is_valid(token.valid_until - Duration::seconds(1)));
        assert!(!token.is_valid(token.valid_until));
    }

    #[test]
    fn test_stored_form_survives_reload() {
        let token = token();
        assert_eq!(Token::from_stored(&token.to_stored()).unwrap(), token);
    }

    #[test]
    fn test_stored_form_fills_defaults() {
        let stored = json!({
            "access_token": "abc",
            "device_id": "dev",
            "vehicle_id": "vin",
            "valid_until": "2024-07-15T12:00:00Z",
        });
        let token = Token::from_stored(&stored).unwrap();
        assert_eq!(token.authorization(), "Bearer abc");
        assert!(token.refresh_token.is_none());
    }
}
