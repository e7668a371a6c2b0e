//! Kia UVO cloud API client
//!
//! [`VehicleApi`] is the seam the vehicle talks through; [`KiaUvoApi`] is the
//! HTTP implementation against the EU endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::Credentials;
use crate::constants::*;
use crate::error::{KiaUvoError, Result};
use crate::status::{temperature_code, StatusEnvelope, VehicleStatus};
use crate::token::Token;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cabin climate request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSettings {
    /// Target cabin temperature in °C
    pub temperature: f64,
    pub defrost: bool,
    pub heating: bool,
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_CLIMATE_TEMPERATURE,
            defrost: false,
            heating: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    fn wire_action(&self) -> &'static str {
        match self {
            LockAction::Lock => "close",
            LockAction::Unlock => "open",
        }
    }
}

/// Operations the integration needs from the vendor cloud
#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// Full username/password login, discovering the first vehicle
    async fn login(&self) -> Result<Token>;

    /// Renew the access token with the token's refresh token
    async fn refresh_access_token(&self, token: &Token) -> Result<Token>;

    /// Last status the cloud holds for the vehicle
    async fn get_cached_vehicle_status(&self, token: &Token) -> Result<VehicleStatus>;

    /// Ask the cloud to wake the vehicle and pull fresh data from it
    async fn update_vehicle_status(&self, token: &Token) -> Result<()>;

    async fn start_climate(&self, token: &Token, settings: &ClimateSettings) -> Result<()>;

    async fn stop_climate(&self, token: &Token) -> Result<()>;

    async fn lock_action(&self, token: &Token, action: LockAction) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehiclesEnvelope {
    res_msg: VehiclesResMsg,
}

#[derive(Debug, Deserialize)]
struct VehiclesResMsg {
    #[serde(default)]
    vehicles: Vec<VehicleSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleSummary {
    vehicle_id: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    vehicle_name: Option<String>,
}

/// HTTP client for the EU Kia UVO API
pub struct KiaUvoApi {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    time_zone: Tz,
}

impl KiaUvoApi {
    pub fn new(credentials: Credentials, time_zone: Tz) -> Result<Self> {
        Self::with_base_url(BASE_URL, credentials, time_zone)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        credentials: Credentials,
        time_zone: Tz,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            time_zone,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn vehicle_url(&self, token: &Token, path: &str) -> String {
        self.url(&format!(
            "/api/v2/spa/vehicles/{}/{}",
            token.vehicle_id, path
        ))
    }

    fn authorized(&self, request: RequestBuilder, token: &Token) -> RequestBuilder {
        request
            .header("Authorization", token.authorization())
            .header("ccsp-device-id", &token.device_id)
            .header("ccsp-service-id", CLIENT_ID)
    }

    async fn sign_in(&self) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/v1/user/signin"))
            .json(&json!({
                "email": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()
            .await?;
        let body: SignInResponse = check(response)
            .await
            .map_err(auth_on_client_error)?
            .json()
            .await?;

        let redirect = Url::parse(&body.redirect_url)
            .map_err(|e| KiaUvoError::UnexpectedResponse(format!("bad redirect url: {}", e)))?;
        redirect
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, code)| code.into_owned())
            .ok_or_else(|| KiaUvoError::UnexpectedResponse("redirect url carries no code".into()))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.url("/api/v1/user/oauth2/token"))
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(form)
            .send()
            .await?;
        Ok(check(response)
            .await
            .map_err(auth_on_client_error)?
            .json()
            .await?)
    }

    async fn first_vehicle(&self, token: &Token) -> Result<VehicleSummary> {
        let response = self
            .authorized(self.http.get(self.url("/api/v1/spa/vehicles")), token)
            .send()
            .await?;
        let body: VehiclesEnvelope = check(response).await?.json().await?;
        body.res_msg
            .vehicles
            .into_iter()
            .next()
            .ok_or(KiaUvoError::NoVehicle)
    }

    async fn control(&self, token: &Token, path: &str, body: serde_json::Value) -> Result<()> {
        let response = self
            .authorized(self.http.post(self.vehicle_url(token, path)), token)
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

fn expiry(expires_in: i64) -> Result<chrono::DateTime<Utc>> {
    ChronoDuration::try_seconds(expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS))
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            KiaUvoError::UnexpectedResponse(format!("token lifetime out of range: {}s", expires_in))
        })
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        Err(KiaUvoError::Auth(message))
    } else {
        Err(KiaUvoError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// The auth endpoints answer rejected credentials with a plain 4xx
fn auth_on_client_error(error: KiaUvoError) -> KiaUvoError {
    match error {
        KiaUvoError::Api { status, message } if (400..500).contains(&status) => {
            KiaUvoError::Auth(message)
        }
        other => other,
    }
}

#[async_trait]
impl VehicleApi for KiaUvoApi {
    #[instrument(skip(self), fields(username = %self.credentials.username))]
    async fn login(&self) -> Result<Token> {
        let code = self.sign_in().await?;
        let redirect_uri = self.url(REDIRECT_PATH);
        let granted = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
                ("code", code.as_str()),
            ])
            .await?;

        let mut token = Token {
            access_token: granted.access_token,
            refresh_token: granted.refresh_token,
            token_type: granted.token_type.unwrap_or_else(|| "Bearer".to_string()),
            device_id: ulid::Ulid::new().to_string(),
            vehicle_id: String::new(),
            vehicle_name: String::new(),
            vehicle_model: String::new(),
            valid_until: expiry(granted.expires_in)?,
        };

        let vehicle = self.first_vehicle(&token).await?;
        token.vehicle_name = vehicle.nickname.clone().unwrap_or_default();
        token.vehicle_model = vehicle.vehicle_name.unwrap_or_default();
        if token.vehicle_name.is_empty() {
            token.vehicle_name = token.vehicle_model.clone();
        }
        token.vehicle_id = vehicle.vehicle_id;

        debug!(vehicle_id = %token.vehicle_id, "Logged in");
        Ok(token)
    }

    async fn refresh_access_token(&self, token: &Token) -> Result<Token> {
        let Some(refresh_token) = token.refresh_token.as_deref() else {
            return Err(KiaUvoError::Auth("no refresh token".to_string()));
        };
        let redirect_uri = self.url(REDIRECT_PATH);
        let granted = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("redirect_uri", redirect_uri.as_str()),
                ("refresh_token", refresh_token),
            ])
            .await?;

        Ok(Token {
            access_token: granted.access_token,
            refresh_token: granted.refresh_token.or_else(|| token.refresh_token.clone()),
            token_type: granted
                .token_type
                .unwrap_or_else(|| token.token_type.clone()),
            valid_until: expiry(granted.expires_in)?,
            ..token.clone()
        })
    }

    async fn get_cached_vehicle_status(&self, token: &Token) -> Result<VehicleStatus> {
        let response = self
            .authorized(
                self.http.get(self.vehicle_url(token, "status/latest")),
                token,
            )
            .send()
            .await?;
        let body: StatusEnvelope = check(response).await?.json().await?;
        let info = body
            .res_msg
            .into_info()
            .ok_or_else(|| KiaUvoError::UnexpectedResponse("status without vehicle data".into()))?;
        Ok(VehicleStatus::from_wire(info, self.time_zone))
    }

    async fn update_vehicle_status(&self, token: &Token) -> Result<()> {
        let url = self.url(&format!("/api/v1/spa/vehicles/{}/status", token.vehicle_id));
        let response = self.authorized(self.http.get(url), token).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn start_climate(&self, token: &Token, settings: &ClimateSettings) -> Result<()> {
        self.control(
            token,
            "control/temperature",
            json!({
                "action": "start",
                "hvacType": 0,
                "options": {
                    "defrost": settings.defrost,
                    "heating1": u8::from(settings.heating),
                },
                "tempCode": temperature_code(settings.temperature),
                "unit": "C",
            }),
        )
        .await
    }

    async fn stop_climate(&self, token: &Token) -> Result<()> {
        self.control(
            token,
            "control/temperature",
            json!({
                "action": "stop",
                "hvacType": 0,
                "options": {"defrost": true, "heating1": 1},
                "tempCode": temperature_code(DEFAULT_CLIMATE_TEMPERATURE),
                "unit": "C",
            }),
        )
        .await
    }

    async fn lock_action(&self, token: &Token, action: LockAction) -> Result<()> {
        self.control(
            token,
            "control/door",
            json!({
                "action": action.wire_action(),
                "deviceId": token.device_id,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::dt::DEFAULT_TIME_ZONE;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            username: "owner@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn api(server: &MockServer) -> KiaUvoApi {
        KiaUvoApi::with_base_url(server.uri(), credentials(), DEFAULT_TIME_ZONE).unwrap()
    }

    fn token() -> Token {
        Token {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            device_id: "device-1".to_string(),
            vehicle_id: "vin-1".to_string(),
            vehicle_name: "EV6".to_string(),
            vehicle_model: "EV6".to_string(),
            valid_until: Utc::now() + ChronoDuration::hours(1),
        }
    }

    async fn mount_token_endpoint(server: &MockServer, grant: &str, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/api/v1/user/oauth2/token"))
            .and(body_string_contains(format!("grant_type={}", grant)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "refresh_token": "new-refresh",
                "token_type": "Bearer",
                "expires_in": 86400,
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_discovers_vehicle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/signin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "redirectUrl": format!("{}/api/v1/user/oauth2/redirect?code=abc123&state=test", server.uri()),
            })))
            .mount(&server)
            .await;
        mount_token_endpoint(&server, "authorization_code", "fresh-access").await;
        Mock::given(method("GET"))
            .and(path("/api/v1/spa/vehicles"))
            .and(header("Authorization", "Bearer fresh-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resMsg": {
                    "vehicles": [{"vehicleId": "vin-1", "nickname": "Family car", "vehicleName": "EV6"}]
                }
            })))
            .mount(&server)
            .await;

        let token = api(&server).login().await.unwrap();

        assert_eq!(token.access_token, "fresh-access");
        assert_eq!(token.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(token.vehicle_id, "vin-1");
        assert_eq!(token.vehicle_name, "Family car");
        assert_eq!(token.vehicle_model, "EV6");
        assert!(token.is_valid(Utc::now()));
    }

    #[tokio::test]
    async fn test_login_without_vehicles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/signin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "redirectUrl": "https://example.com/redirect?code=abc",
            })))
            .mount(&server)
            .await;
        mount_token_endpoint(&server, "authorization_code", "fresh-access").await;
        Mock::given(method("GET"))
            .and(path("/api/v1/spa/vehicles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resMsg": {"vehicles": []}})))
            .mount(&server)
            .await;

        let result = api(&server).login().await;
        assert!(matches!(result, Err(KiaUvoError::NoVehicle)));
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/signin"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid password"))
            .mount(&server)
            .await;

        let error = api(&server).login().await.unwrap_err();
        assert!(error.is_auth(), "got {:?}", error);
    }

    #[tokio::test]
    async fn test_refresh_keeps_vehicle_identity() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, "refresh_token", "renewed").await;

        let old = token();
        let renewed = api(&server).refresh_access_token(&old).await.unwrap();

        assert_eq!(renewed.access_token, "renewed");
        assert_eq!(renewed.device_id, old.device_id);
        assert_eq!(renewed.vehicle_id, old.vehicle_id);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let server = MockServer::start().await;
        let token = Token {
            refresh_token: None,
            ..token()
        };

        let error = api(&server).refresh_access_token(&token).await.unwrap_err();
        assert!(matches!(error, KiaUvoError::Auth(_)));
    }

    #[tokio::test]
    async fn test_cached_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/spa/vehicles/vin-1/status/latest"))
            .and(header("ccsp-device-id", "device-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resMsg": {
                    "vehicleStatusInfo": {
                        "vehicleStatus": {"time": "20240715120000", "doorLock": true},
                        "odometer": {"value": 1000, "unit": 1}
                    }
                }
            })))
            .mount(&server)
            .await;

        let status = api(&server).get_cached_vehicle_status(&token()).await.unwrap();
        assert_eq!(status.door_lock, Some(true));
        assert_eq!(status.odometer.map(|o| o.value), Some(1000.0));
    }

    #[tokio::test]
    async fn test_status_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/spa/vehicles/vin-1/status/latest"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let error = api(&server).get_cached_vehicle_status(&token()).await.unwrap_err();
        assert!(matches!(error, KiaUvoError::Auth(_)));
    }

    #[tokio::test]
    async fn test_empty_status_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/spa/vehicles/vin-1/status/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resMsg": {}})))
            .mount(&server)
            .await;

        let error = api(&server).get_cached_vehicle_status(&token()).await.unwrap_err();
        assert!(matches!(error, KiaUvoError::UnexpectedResponse(_)), "got {:?}", error);
    }

    #[tokio::test]
    async fn test_absurd_token_lifetime_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "renewed",
                "expires_in": i64::MAX,
            })))
            .mount(&server)
            .await;

        let error = api(&server).refresh_access_token(&token()).await.unwrap_err();
        assert!(matches!(error, KiaUvoError::UnexpectedResponse(_)), "got {:?}", error);
    }

    #[tokio::test]
    async fn test_force_update_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/spa/vehicles/vin-1/status"))
            .respond_with(ResponseTemplate::new(503).set_body_string("modem asleep"))
            .mount(&server)
            .await;

        let error = api(&server).update_vehicle_status(&token()).await.unwrap_err();
        assert!(matches!(
            error,
            KiaUvoError::Api { status: 503, ref message } if message == "modem asleep"
        ));
    }

    #[tokio::test]
    async fn test_climate_and_lock_commands() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/spa/vehicles/vin-1/control/temperature"))
            .and(body_string_contains("\"tempCode\":\"0EH\""))
            .and(body_string_contains("\"action\":\"start\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/spa/vehicles/vin-1/control/door"))
            .and(body_string_contains("\"action\":\"close\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server);
        api.start_climate(&token(), &ClimateSettings::default())
            .await
            .unwrap();
        api.lock_action(&token(), LockAction::Lock).await.unwrap();
    }
}
