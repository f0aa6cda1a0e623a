//! Integration tests for tesla-client
//!
//! These tests spin up the mock owner API on a local port and drive the client
//! against it over real HTTP.

use std::convert::Infallible;
use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use tesla_client::streaming::STREAM_FIELDS;
use tesla_client::testing::{fixtures, test_credentials, MockTeslaApi, TestServer, TEST_ACCESS_TOKEN};
use tesla_client::{
    ClientConfig, Credentials, ParseError, RoofState, StreamError, StreamOptions, TelemetryStream,
    TeslaClient, TeslaClientError, Trunk, Vehicle,
};
use tokio::sync::mpsc;

// =============================================================================
// Test Helpers
// =============================================================================

struct TestContext {
    api: MockTeslaApi,
    client: TeslaClient,
    _server: TestServer,
}

async fn create_test_context(api: MockTeslaApi) -> TestContext {
    let server = TestServer::start(api.router()).await.unwrap();
    let client = server.connect().await.unwrap();
    TestContext {
        api,
        client,
        _server: server,
    }
}

async fn create_default_context() -> TestContext {
    create_test_context(MockTeslaApi::new()).await
}

async fn first_vehicle(client: &TeslaClient) -> Vehicle {
    client.vehicles().await.unwrap().remove(0)
}

/// Body that yields each chunk as it is sent, ending when the sender drops
fn channel_body(rx: mpsc::Receiver<Bytes>) -> impl futures::Stream<Item = Result<Bytes, Infallible>> + Send + Unpin {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok(chunk), rx))
    }))
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_authenticate() {
    let ctx = create_default_context().await;

    let token = ctx.client.token().await.unwrap();
    assert_eq!(token.access_token, TEST_ACCESS_TOKEN);
    assert!(!token.expires_soon());

    let requests = ctx.api.requests_to("/oauth/token").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");

    let grant: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(grant["grant_type"], "password");
    assert_eq!(grant["client_id"], "someclient123");
    assert_eq!(grant["client_secret"], "somesecret456");
    assert_eq!(grant["email"], "nobody@example.com");
    assert_eq!(grant["password"], "pass");
}

#[tokio::test]
async fn test_authenticate_bad_credentials() {
    let server = TestServer::start(MockTeslaApi::new().router()).await.unwrap();
    let credentials = Credentials::new("someclient123", "somesecret456", "nobody@example.com", "wrong");

    let result = TeslaClient::authenticate(server.config(), credentials).await;
    match result {
        Err(TeslaClientError::Unauthorized(message)) => assert_eq!(message, "bad credentials"),
        other => panic!("Expected Unauthorized, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_expiring_token_is_refreshed() {
    let ctx = create_test_context(MockTeslaApi::new().with_token_expires_in(60)).await;

    ctx.client.vehicles().await.unwrap();
    ctx.client.vehicles().await.unwrap();

    // Initial grant plus one refresh before each request
    assert_eq!(ctx.api.requests_to("/oauth/token").await.len(), 3);
}

#[tokio::test]
async fn test_fresh_token_is_reused() {
    let ctx = create_default_context().await;

    ctx.client.vehicles().await.unwrap();
    ctx.client.vehicles().await.unwrap();

    assert_eq!(ctx.api.requests_to("/oauth/token").await.len(), 1);
}

// =============================================================================
// Vehicle Tests
// =============================================================================

#[tokio::test]
async fn test_list_vehicles() {
    let ctx = create_default_context().await;

    let vehicles = ctx.client.vehicles().await.unwrap();
    assert_eq!(vehicles.len(), 1);

    let vehicle = &vehicles[0];
    assert_eq!(vehicle.id, 123);
    assert_eq!(vehicle.vehicle_id, 456);
    assert_eq!(vehicle.vin, "abc123");
    assert_eq!(vehicle.name(), "Otto");
    assert_eq!(vehicle.tokens, vec!["456", "789"]);
    assert!(vehicle.is_online());

    let requests = ctx.api.requests_to("/api/1/vehicles").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer sometoken123")
    );
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_get_vehicle() {
    let ctx = create_default_context().await;

    let vehicle = ctx.client.vehicle(123).await.unwrap();
    assert_eq!(vehicle.display_name.as_deref(), Some("Otto"));
}

#[tokio::test]
async fn test_get_vehicle_not_found() {
    let ctx = create_default_context().await;

    let result = ctx.client.vehicle(999).await;
    assert!(matches!(
        result,
        Err(TeslaClientError::ServerError { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_wake_up() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let woken = ctx.client.wake_up(&vehicle).await.unwrap();
    assert_eq!(woken, vehicle);

    let requests = ctx.api.requests_to("/api/1/vehicles/123/wake_up").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
}

// =============================================================================
// State Tests
// =============================================================================

#[tokio::test]
async fn test_mobile_enabled() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    assert!(ctx.client.mobile_enabled(&vehicle).await.unwrap());
}

#[tokio::test]
async fn test_charge_state() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let state = ctx.client.charge_state(&vehicle).await.unwrap();
    assert_eq!(state.battery_level, 90);
    assert_eq!(state.charge_limit_soc, 90);
    assert_eq!(state.charging_state.as_deref(), Some("Complete"));
    assert_eq!(state.battery_range, 235.92);
    assert_eq!(state.battery_current, None);

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/data_request/charge_state")
        .await;
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn test_climate_state() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let state = ctx.client.climate_state(&vehicle).await.unwrap();
    assert_eq!(state.driver_temp_setting, 22.0);
    assert_eq!(state.passenger_temp_setting, 22.0);
    assert_eq!(state.inside_temp, None);
    assert!(!state.is_climate_on);
}

#[tokio::test]
async fn test_drive_state() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let state = ctx.client.drive_state(&vehicle).await.unwrap();
    assert_eq!(state.latitude, 3.6);
    assert_eq!(state.longitude, -149.1);
    assert_eq!(state.heading, 57);
    assert_eq!(state.shift_state, None);
}

#[tokio::test]
async fn test_gui_settings() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let settings = ctx.client.gui_settings(&vehicle).await.unwrap();
    assert_eq!(settings.gui_distance_units, "mi/hr");
    assert_eq!(settings.gui_temperature_units, "F");
    assert!(settings.gui_24_hour_time);
}

#[tokio::test]
async fn test_vehicle_state() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let state = ctx.client.vehicle_state(&vehicle).await.unwrap();
    assert_eq!(state.car_version, "2.9.12");
    assert_eq!(state.vehicle_name.as_deref(), Some("Macak"));
    assert!(state.locked);
}

#[tokio::test]
async fn test_unauthorized_request() {
    let server = TestServer::start(MockTeslaApi::new().router()).await.unwrap();
    let token = tesla_client::Token {
        access_token: "expired".to_string(),
        token_type: None,
        refresh_token: None,
        expires_at: chrono::Utc::now() + chrono::Duration::days(1),
    };
    let client = TeslaClient::with_token(server.config(), test_credentials(), token).unwrap();

    let result = client.vehicles().await;
    assert!(matches!(result, Err(TeslaClientError::Unauthorized(_))));
}

// =============================================================================
// Command Tests
// =============================================================================

#[tokio::test]
async fn test_simple_commands() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client.lock_doors(&vehicle).await.unwrap();
    ctx.client.unlock_doors(&vehicle).await.unwrap();
    ctx.client.flash_lights(&vehicle).await.unwrap();
    ctx.client.honk_horn(&vehicle).await.unwrap();
    ctx.client.reset_valet_pin(&vehicle).await.unwrap();
    ctx.client.open_charge_port(&vehicle).await.unwrap();
    ctx.client.stop_charging(&vehicle).await.unwrap();
    ctx.client.set_charge_limit_max(&vehicle).await.unwrap();
    ctx.client.start_air_conditioning(&vehicle).await.unwrap();
    ctx.client.stop_air_conditioning(&vehicle).await.unwrap();

    let commands: Vec<String> = ctx
        .api
        .requests()
        .await
        .into_iter()
        .filter(|r| r.path.starts_with("/api/1/vehicles/123/command/"))
        .map(|r| r.path.trim_start_matches("/api/1/vehicles/123/command/").to_string())
        .collect();
    assert_eq!(
        commands,
        vec![
            "door_lock",
            "door_unlock",
            "flash_lights",
            "honk_horn",
            "reset_valet_pin",
            "charge_port_door_open",
            "charge_stop",
            "charge_max_range",
            "auto_conditioning_start",
            "auto_conditioning_stop",
        ]
    );
}

#[tokio::test]
async fn test_command_failure_reason() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let err = ctx
        .client
        .set_charge_limit_standard(&vehicle)
        .await
        .unwrap_err();
    assert!(matches!(err, TeslaClientError::CommandFailed(_)));
    assert_eq!(err.to_string(), "already_standard");

    let err = ctx.client.start_charging(&vehicle).await.unwrap_err();
    assert_eq!(err.to_string(), "complete");
}

#[tokio::test]
async fn test_command_false_without_reason_succeeds() {
    let api = MockTeslaApi::new()
        .with_command_response("honk_horn", r#"{"response":{"reason":"","result":false}}"#);
    let ctx = create_test_context(api).await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client.honk_horn(&vehicle).await.unwrap();
}

#[tokio::test]
async fn test_set_charge_limit() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    // The mock answers this command with an empty body
    ctx.client.set_charge_limit(&vehicle, 50).await.unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/set_charge_limit")
        .await;
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"percent": 50}));
}

#[tokio::test]
async fn test_set_temperature() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client
        .set_temperature(&vehicle, 68.1, 73.4)
        .await
        .unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/set_temps")
        .await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].query.as_deref(),
        Some("driver_temp=68.1&passenger_temp=73.4")
    );
}

#[tokio::test]
async fn test_remote_start() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client.remote_start(&vehicle, "pass").await.unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/remote_start_drive")
        .await;
    assert_eq!(requests[0].query.as_deref(), Some("password=pass"));
}

#[tokio::test]
async fn test_open_trunk() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client.open_trunk(&vehicle, Trunk::Rear).await.unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/trunk_open")
        .await;
    assert_eq!(requests[0].body, r#"{"which_trunk":"rear"}"#);
}

#[tokio::test]
async fn test_move_roof() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client
        .move_roof(&vehicle, RoofState::Move, 50)
        .await
        .unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/sun_roof_control")
        .await;
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"state": "move", "percent": 50}));
}

#[tokio::test]
async fn test_autopark_uses_drive_position() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client.autopark_forward(&vehicle).await.unwrap();
    ctx.client.autopark_reverse(&vehicle).await.unwrap();
    ctx.client.autopark_abort(&vehicle).await.unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/autopark_request")
        .await;
    let actions: Vec<serde_json::Value> = requests
        .iter()
        .map(|r| serde_json::from_str(&r.body).unwrap())
        .collect();
    assert_eq!(
        actions,
        vec![
            serde_json::json!({"action": "start_forward", "lat": 3.6, "lon": -149.1, "vehicle_id": 456}),
            serde_json::json!({"action": "start_reverse", "lat": 3.6, "lon": -149.1, "vehicle_id": 456}),
            serde_json::json!({"action": "abort", "lat": 3.6, "lon": -149.1, "vehicle_id": 456}),
        ]
    );

    // Each summon reads the drive state first
    let drive_reads = ctx
        .api
        .requests_to("/api/1/vehicles/123/data_request/drive_state")
        .await;
    assert_eq!(drive_reads.len(), 3);
}

#[tokio::test]
async fn test_toggle_homelink() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    ctx.client.toggle_homelink(&vehicle).await.unwrap();

    let requests = ctx
        .api
        .requests_to("/api/1/vehicles/123/command/trigger_homelink")
        .await;
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"lat": 3.6, "lon": -149.1}));
}

// =============================================================================
// Streaming Tests
// =============================================================================

#[tokio::test]
async fn test_stream_request_shape() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let stream = ctx.client.stream(&vehicle).await.unwrap();
    stream.close().await;

    let requests = ctx.api.requests_to("/stream/456/").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(
        requests[0].query.as_deref(),
        Some(format!("values={}", STREAM_FIELDS.join(",")).as_str())
    );
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Basic bm9ib2R5QGV4YW1wbGUuY29tOjQ1Ng==")
    );
}

#[tokio::test]
async fn test_stream_single_record() {
    let ctx = create_default_context().await;
    let vehicle = first_vehicle(&ctx.client).await;

    let mut stream = ctx.client.stream(&vehicle).await.unwrap();

    let event = stream.recv_event().await.unwrap();
    assert_eq!(event.timestamp.timestamp_millis(), 1452491619000);
    assert_eq!(event.speed, 65);
    assert_eq!(event.odometer, 1234.5);
    assert_eq!(event.state_of_charge, 90);
    assert_eq!(event.elevation, 100);
    assert_eq!(event.estimated_heading, 45);
    assert_eq!(event.estimated_latitude, 37.1);
    assert_eq!(event.estimated_longitude, -122.2);
    assert_eq!(event.power, 10);
    assert_eq!(event.shift_state, "D");
    assert_eq!(event.range, 200);
    assert_eq!(event.estimated_range, 210);
    assert_eq!(event.heading, 60);

    assert!(matches!(stream.recv_error().await, Some(StreamError::Closed)));
    assert!(stream.recv_event().await.is_none());
    assert!(stream.recv_error().await.is_none());
}

#[tokio::test]
async fn test_stream_end_to_end() {
    let api = MockTeslaApi::new().with_stream_lines([
        fixtures::STREAM_RECORD,
        fixtures::STREAM_RECORD,
        "1,2,3,4,5",
    ]);
    let ctx = create_test_context(api).await;
    let vehicle = first_vehicle(&ctx.client).await;

    let mut stream = ctx.client.stream(&vehicle).await.unwrap();

    let mut events = Vec::new();
    let mut errors = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => events.push(event),
            Err(e) => errors.push(e),
        }
    }

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], events[1]);

    assert_eq!(errors.len(), 2);
    assert!(matches!(
        errors[0],
        StreamError::Parse(ParseError::InvalidFieldCount {
            expected: 13,
            found: 5
        })
    ));
    assert!(matches!(errors[1], StreamError::Closed));

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_open_rejected() {
    let api = MockTeslaApi::new().with_stream_status(StatusCode::UNAUTHORIZED);
    let ctx = create_test_context(api).await;
    let vehicle = first_vehicle(&ctx.client).await;

    let result = ctx.client.stream(&vehicle).await;
    assert!(matches!(
        result,
        Err(TeslaClientError::Stream(StreamError::Server { status: 401, .. }))
    ));
}

#[tokio::test]
async fn test_stream_connection_refused() {
    let server = TestServer::start(MockTeslaApi::new().router()).await.unwrap();

    // Reserve a port, then free it so nothing is listening there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = ClientConfig {
        stream_url: dead,
        ..server.config()
    };
    let client = TeslaClient::authenticate(config, test_credentials())
        .await
        .unwrap();
    let vehicle = first_vehicle(&client).await;

    let result = client.stream(&vehicle).await;
    assert!(matches!(
        result,
        Err(TeslaClientError::Stream(StreamError::Connection(_)))
    ));
}

#[tokio::test]
async fn test_stream_missing_token() {
    let ctx = create_default_context().await;
    let vehicle = Vehicle {
        tokens: Vec::new(),
        ..first_vehicle(&ctx.client).await
    };

    let result = ctx.client.stream(&vehicle).await;
    assert!(matches!(
        result,
        Err(TeslaClientError::Stream(StreamError::MissingToken { vehicle_id: 456 }))
    ));
    assert!(ctx.api.requests_to("/stream/456/").await.is_empty());
}

#[tokio::test]
async fn test_stream_slow_consumer_loses_nothing() {
    let (tx, rx) = mpsc::channel(64);
    let mut stream = TelemetryStream::from_byte_stream(channel_body(rx), &StreamOptions::default());

    let producer = tokio::spawn(async move {
        for speed in 0..20 {
            let line = format!(
                "1452491619000,{},1234.5,90,100,45,37.1,-122.2,10,D,200,210,60\n",
                speed
            );
            // Split each record across two chunks
            let (head, tail) = line.split_at(10);
            tx.send(Bytes::from(head.to_string())).await.unwrap();
            tx.send(Bytes::from(tail.to_string())).await.unwrap();
        }
    });

    let mut speeds = Vec::new();
    loop {
        tokio::time::sleep(Duration::from_millis(2)).await;
        match stream.next().await {
            Some(Ok(event)) => speeds.push(event.speed),
            Some(Err(StreamError::Closed)) => break,
            Some(Err(e)) => panic!("Unexpected stream error: {}", e),
            None => panic!("Stream ended without Closed"),
        }
    }

    producer.await.unwrap();
    assert_eq!(speeds, (0..20).collect::<Vec<i32>>());
}

#[tokio::test]
async fn test_stream_closer_stops_open_connection() {
    let (tx, rx) = mpsc::channel(4);
    let stream = TelemetryStream::from_byte_stream(channel_body(rx), &StreamOptions::default());
    let closer = stream.closer();

    let (mut events, mut errors) = stream.into_channels();

    tx.send(Bytes::from(format!("{}\n", fixtures::STREAM_RECORD)))
        .await
        .unwrap();
    assert_eq!(events.recv().await.unwrap().speed, 65);

    closer.close();
    assert!(closer.is_closed());

    assert!(matches!(errors.recv().await, Some(StreamError::Closed)));
    assert!(errors.recv().await.is_none());
    assert!(events.recv().await.is_none());
}
