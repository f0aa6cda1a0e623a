//! Test utilities for tesla-client
//!
//! Provides an in-process mock of the owner API and the streaming endpoint, and
//! a server wrapper that binds it to a local port.
//!
//! ```rust,ignore
//! use tesla_client::testing::{MockTeslaApi, TestServer};
//!
//! let api = MockTeslaApi::new().with_stream_lines(["1452491619000,65,..."]);
//! let server = TestServer::start(api.router()).await?;
//! let client = server.connect().await?;
//! let vehicles = client.vehicles().await?;
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{ClientConfig, Credentials, Result, TeslaClient};

/// Access token issued by the mock API
pub const TEST_ACCESS_TOKEN: &str = "sometoken123";

/// Credentials the mock API accepts
pub fn test_credentials() -> Credentials {
    Credentials::new(
        "someclient123",
        "somesecret456",
        "nobody@example.com",
        "pass",
    )
}

/// Canned owner API responses
pub mod fixtures {
    pub const VEHICLES_JSON: &str = r#"{"response":[{"color":null,"display_name":"Otto","id":123,"option_codes":"MDL3,RENA,AU01,BC3B,BS00","user_id":123,"vehicle_id":456,"vin":"abc123","tokens":["456","789"],"state":"online","id_s":"123","remote_start_enabled":true,"calendar_enabled":true,"notifications_enabled":true,"backseat_token":null,"backseat_token_updated_at":null}],"count":1}"#;
    pub const VEHICLE_JSON: &str = r#"{"response":{"color":null,"display_name":"Otto","id":123,"option_codes":"MDL3,RENA,AU01,BC3B,BS00","user_id":123,"vehicle_id":456,"vin":"abc123","tokens":["456","789"],"state":"online","id_s":"123","remote_start_enabled":true,"calendar_enabled":true,"notifications_enabled":true,"backseat_token":null,"backseat_token_updated_at":null}}"#;
    pub const TRUE_JSON: &str = r#"{"response":true}"#;
    pub const CHARGE_STATE_JSON: &str = r#"{"response":{"charging_state":"Complete","charge_limit_soc":90,"charge_limit_soc_std":90,"charge_limit_soc_min":50,"charge_limit_soc_max":100,"charge_to_max_range":false,"battery_heater_on":null,"not_enough_power_to_heat":null,"max_range_charge_counter":0,"fast_charger_present":null,"fast_charger_type":"<invalid>","battery_range":235.92,"est_battery_range":200.46,"ideal_battery_range":304.73,"battery_level":90,"usable_battery_level":90,"battery_current":null,"charge_energy_added":19.94,"charge_miles_added_rated":64.5,"charge_miles_added_ideal":83.0,"charger_voltage":null,"charger_pilot_current":null,"charger_actual_current":null,"charger_power":null,"time_to_full_charge":0.0,"trip_charging":null,"charge_rate":0.0,"charge_port_door_open":null,"motorized_charge_port":true,"scheduled_charging_start_time":null,"scheduled_charging_pending":false,"user_charge_enable_request":null,"charge_enable_request":true,"eu_vehicle":false,"charger_phases":null,"charge_port_latch":"<invalid>","charge_current_request":40,"charge_current_request_max":40,"managed_charging_active":false,"managed_charging_user_canceled":false,"managed_charging_start_time":null}}"#;
    pub const CLIMATE_STATE_JSON: &str = r#"{"response":{"inside_temp":null,"outside_temp":null,"driver_temp_setting":22.0,"passenger_temp_setting":22.0,"left_temp_direction":17,"right_temp_direction":17,"is_auto_conditioning_on":null,"is_front_defroster_on":null,"is_rear_defroster_on":false,"fan_status":null,"is_climate_on":false,"min_avail_temp":15,"max_avail_temp":28,"seat_heater_left":0,"seat_heater_right":0,"seat_heater_rear_left":0,"seat_heater_rear_right":0,"seat_heater_rear_center":0,"seat_heater_rear_right_back":0,"seat_heater_rear_left_back":0,"smart_preconditioning":false}}"#;
    pub const DRIVE_STATE_JSON: &str = r#"{"response":{"shift_state":null,"speed":null,"latitude":3.6,"longitude":-149.1,"heading":57,"gps_as_of":1452491619}}"#;
    pub const GUI_SETTINGS_JSON: &str = r#"{"response":{"gui_distance_units":"mi/hr","gui_temperature_units":"F","gui_charge_rate_units":"mi/hr","gui_24_hour_time":true,"gui_range_display":"Rated"}}"#;
    pub const VEHICLE_STATE_JSON: &str = r#"{"response":{"api_version":3,"calendar_supported":true,"car_type":"s","car_version":"2.9.12","center_display_state":0,"dark_rims":false,"df":0,"dr":0,"exterior_color":"Black","ft":0,"has_spoiler":true,"locked":true,"notifications_supported":true,"odometer":3738.84633,"parsed_calendar_supported":true,"perf_config":"P2","pf":0,"pr":0,"rear_seat_heaters":1,"remote_start":false,"remote_start_supported":true,"rhd":false,"roof_color":"None","rt":0,"seat_type":1,"sun_roof_installed":2,"sun_roof_percent_open":0,"sun_roof_state":"unknown","third_row_seats":"None","valet_mode":false,"vehicle_name":"Macak","wheel_type":"Super21Gray"}}"#;
    pub const COMMAND_OK_JSON: &str = r#"{"response":{"reason":"","result":true}}"#;
    pub const CHARGE_ALREADY_SET_JSON: &str = r#"{"response":{"reason":"already_standard","result":false}}"#;
    pub const CHARGED_JSON: &str = r#"{"response":{"reason":"complete","result":false}}"#;
    pub const STREAM_RECORD: &str = "1452491619000,65,1234.5,90,100,45,37.1,-122.2,10,D,200,210,60";
}

/// A request seen by the mock API
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug)]
struct MockInner {
    credentials: Credentials,
    token_expires_in: i64,
    stream_lines: Vec<String>,
    stream_status: StatusCode,
    command_responses: HashMap<String, String>,
    requests: Vec<RecordedRequest>,
}

/// In-process stand-in for the owner API and the streaming endpoint
#[derive(Debug, Clone)]
pub struct MockTeslaApi {
    inner: Arc<Mutex<MockInner>>,
}

impl Default for MockTeslaApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTeslaApi {
    pub fn new() -> Self {
        let mut command_responses = HashMap::new();
        command_responses.insert(
            "charge_standard".to_string(),
            fixtures::CHARGE_ALREADY_SET_JSON.to_string(),
        );
        command_responses.insert("charge_start".to_string(), fixtures::CHARGED_JSON.to_string());
        command_responses.insert("set_charge_limit".to_string(), String::new());

        Self {
            inner: Arc::new(Mutex::new(MockInner {
                credentials: test_credentials(),
                token_expires_in: 3_888_000,
                stream_lines: vec![fixtures::STREAM_RECORD.to_string()],
                stream_status: StatusCode::OK,
                command_responses,
                requests: Vec::new(),
            })),
        }
    }

    /// Lines served by the streaming endpoint, each followed by `\n`
    pub fn with_stream_lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update(|inner| inner.stream_lines = lines.into_iter().map(Into::into).collect())
    }

    /// Status returned by the streaming endpoint
    pub fn with_stream_status(self, status: StatusCode) -> Self {
        self.update(|inner| inner.stream_status = status)
    }

    /// Body returned for a command; empty means an empty 200
    pub fn with_command_response(self, command: &str, body: &str) -> Self {
        self.update(|inner| {
            inner
                .command_responses
                .insert(command.to_string(), body.to_string());
        })
    }

    /// Lifetime of issued tokens in seconds
    pub fn with_token_expires_in(self, seconds: i64) -> Self {
        self.update(|inner| inner.token_expires_in = seconds)
    }

    fn update(self, f: impl FnOnce(&mut MockInner)) -> Self {
        match self.inner.try_lock() {
            Ok(mut inner) => f(&mut inner),
            Err(_) => tracing::warn!("Mock API is busy; configuration ignored"),
        }
        self
    }

    /// Every request received so far
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().await.requests.clone()
    }

    /// Requests whose path matches exactly
    pub async fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/vehicles", get(vehicles))
            .route("/vehicles/{id}", get(vehicle))
            .route("/vehicles/{id}/mobile_enabled", get(mobile_enabled))
            .route("/vehicles/{id}/data_request/{resource}", get(data_request))
            .route("/vehicles/{id}/wake_up", post(wake_up))
            .route("/vehicles/{id}/command/{name}", post(command))
            .layer(middleware::from_fn(require_bearer));

        Router::new()
            .route("/oauth/token", post(issue_token))
            .route("/stream/{vehicle_id}/", get(stream))
            .nest("/api/1", api)
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone())
    }
}

async fn record(State(api): State<MockTeslaApi>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    let header_value = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    };
    api.inner.lock().await.requests.push(recorded);

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn require_bearer(request: Request, next: Next) -> std::result::Result<Response, StatusCode> {
    let expected = format!("Bearer {}", TEST_ACCESS_TOKEN);
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected.as_str()) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn json(body: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

async fn issue_token(State(api): State<MockTeslaApi>, body: Bytes) -> Response {
    let inner = api.inner.lock().await;
    let grant: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();

    let valid = grant["grant_type"] == "password"
        && grant["client_id"] == inner.credentials.client_id.as_str()
        && grant["client_secret"] == inner.credentials.client_secret.as_str()
        && grant["email"] == inner.credentials.email.as_str()
        && grant["password"] == inner.credentials.password.as_str();

    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({"error": "invalid_grant", "error_description": "bad credentials"})),
        )
            .into_response();
    }

    axum::Json(serde_json::json!({
        "access_token": TEST_ACCESS_TOKEN,
        "token_type": "bearer",
        "expires_in": inner.token_expires_in,
        "refresh_token": "somerefresh456",
        "created_at": 1452491619,
    }))
    .into_response()
}

async fn vehicles() -> Response {
    json(fixtures::VEHICLES_JSON)
}

async fn vehicle(Path(id): Path<u64>) -> Response {
    if id == 123 {
        json(fixtures::VEHICLE_JSON)
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn mobile_enabled() -> Response {
    json(fixtures::TRUE_JSON)
}

async fn data_request(Path((_id, resource)): Path<(u64, String)>) -> Response {
    match resource.as_str() {
        "charge_state" => json(fixtures::CHARGE_STATE_JSON),
        "climate_state" => json(fixtures::CLIMATE_STATE_JSON),
        "drive_state" => json(fixtures::DRIVE_STATE_JSON),
        "gui_settings" => json(fixtures::GUI_SETTINGS_JSON),
        "vehicle_state" => json(fixtures::VEHICLE_STATE_JSON),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn wake_up() -> Response {
    json(fixtures::VEHICLE_JSON)
}

async fn command(
    State(api): State<MockTeslaApi>,
    Path((_id, name)): Path<(u64, String)>,
) -> Response {
    let inner = api.inner.lock().await;
    match inner.command_responses.get(&name) {
        Some(body) if body.is_empty() => StatusCode::OK.into_response(),
        Some(body) => json(body),
        None => json(fixtures::COMMAND_OK_JSON),
    }
}

async fn stream(State(api): State<MockTeslaApi>) -> Response {
    let inner = api.inner.lock().await;
    if !inner.stream_status.is_success() {
        return (inner.stream_status, "stream unavailable").into_response();
    }

    let chunks: Vec<std::result::Result<String, Infallible>> = inner
        .stream_lines
        .iter()
        .map(|line| Ok(format!("{}\n", line)))
        .collect();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve a router on an ephemeral local port
    pub async fn start(router: Router) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration pointing at this server, with short timeouts
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            ..ClientConfig::for_origin(&self.base_url())
        }
    }

    /// Authenticate against the server with [`test_credentials`]
    pub async fn connect(&self) -> Result<TeslaClient> {
        TeslaClient::authenticate(self.config(), test_credentials()).await
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_format() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let server_url = format!("http://{}", addr);
        let config = ClientConfig::for_origin(&server_url);
        assert_eq!(config.base_url, "http://127.0.0.1:8080/api/1");
    }

    #[tokio::test]
    async fn test_builder_overrides() {
        let api = MockTeslaApi::new()
            .with_stream_lines(["a", "b"])
            .with_stream_status(StatusCode::FORBIDDEN);
        let inner = api.inner.lock().await;
        assert_eq!(inner.stream_lines, vec!["a", "b"]);
        assert_eq!(inner.stream_status, StatusCode::FORBIDDEN);
    }
}
