//! Tesla owner API client implementation

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

use crate::auth::{Credentials, Token, TokenResponse};
use crate::config::ClientConfig;
use crate::error::{Result, TeslaClientError};
use crate::streaming::{StreamRequest, TelemetryStream};
use crate::types::*;

/// Tesla owner API client
///
/// Every vehicle, state, command and stream operation goes through an explicit
/// client; clone it to share the connection pool and token between tasks.
#[derive(Debug, Clone)]
pub struct TeslaClient {
    client: Client,
    stream_client: Client,
    base_url: Url,
    config: ClientConfig,
    credentials: Arc<Credentials>,
    token: Arc<Mutex<Option<Token>>>,
}

impl TeslaClient {
    /// Create a client and obtain a token with the password grant
    pub async fn authenticate(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        let client = Self::build(config, credentials, None)?;
        client.refresh_token().await?;
        Ok(client)
    }

    /// Create a client around a token obtained earlier
    ///
    /// The credentials are still needed to refresh the token and to authenticate
    /// telemetry streams.
    pub fn with_token(config: ClientConfig, credentials: Credentials, token: Token) -> Result<Self> {
        Self::build(config, credentials, Some(token))
    }

    fn build(config: ClientConfig, credentials: Credentials, token: Option<Token>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .default_headers(headers)
            .build()?;

        // No total timeout: a stream stays open as long as the car keeps talking
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;

        Ok(Self {
            client,
            stream_client,
            base_url,
            config,
            credentials: Arc::new(credentials),
            token: Arc::new(Mutex::new(token)),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Account email, also the stream username
    pub fn email(&self) -> &str {
        &self.credentials.email
    }

    /// Current token, if one has been issued
    pub async fn token(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Request a fresh token with the password grant and store it
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<Token> {
        let mut slot = self.token.lock().await;
        let token = self.request_token().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<Token> {
        let url = self.base_url.join("/oauth/token")?;
        debug!("Requesting token from {}", url);

        let response = self
            .client
            .post(url)
            .json(&self.credentials.password_grant())
            .send()
            .await?;
        let issued: TokenResponse = self.handle_response(response).await?;

        info!(email = %self.credentials.email, "Authenticated");
        Ok(Token::issued(issued, Utc::now()))
    }

    /// Bearer token for the next request, refreshed when about to expire
    async fn access_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        match slot.as_ref() {
            Some(token) if !token.expires_soon() => Ok(token.access_token.clone()),
            _ => {
                debug!("Token missing or expiring, re-authenticating");
                let token = self.request_token().await?;
                let access = token.access_token.clone();
                *slot = Some(token);
                Ok(access)
            }
        }
    }

    // =========================================================================
    // Vehicles
    // =========================================================================

    /// List the vehicles on the account
    #[instrument(skip(self))]
    pub async fn vehicles(&self) -> Result<Vec<Vehicle>> {
        let url = self.api_url("vehicles")?;
        self.get::<Vec<Vehicle>>(url).await
    }

    /// Get a single vehicle by its REST id
    #[instrument(skip(self))]
    pub async fn vehicle(&self, id: u64) -> Result<Vehicle> {
        let url = self.api_url(&format!("vehicles/{}", id))?;
        self.get(url).await
    }

    // =========================================================================
    // States
    // =========================================================================

    /// Whether the vehicle accepts remote control
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    pub async fn mobile_enabled(&self, vehicle: &Vehicle) -> Result<bool> {
        let url = self.vehicle_url(vehicle, "mobile_enabled")?;
        self.get(url).await
    }

    pub async fn charge_state(&self, vehicle: &Vehicle) -> Result<ChargeState> {
        self.fetch_state(vehicle, StateResource::Charge).await
    }

    pub async fn climate_state(&self, vehicle: &Vehicle) -> Result<ClimateState> {
        self.fetch_state(vehicle, StateResource::Climate).await
    }

    pub async fn drive_state(&self, vehicle: &Vehicle) -> Result<DriveState> {
        self.fetch_state(vehicle, StateResource::Drive).await
    }

    pub async fn gui_settings(&self, vehicle: &Vehicle) -> Result<GuiSettings> {
        self.fetch_state(vehicle, StateResource::Gui).await
    }

    pub async fn vehicle_state(&self, vehicle: &Vehicle) -> Result<VehicleState> {
        self.fetch_state(vehicle, StateResource::Vehicle).await
    }

    /// Fetch one `data_request` resource
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    pub async fn fetch_state<T: DeserializeOwned>(
        &self,
        vehicle: &Vehicle,
        resource: StateResource,
    ) -> Result<T> {
        let url = self.vehicle_url(vehicle, &format!("data_request/{}", resource.path()))?;
        self.get(url).await
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Open the live telemetry stream for a vehicle
    ///
    /// Authenticates with the account email and the vehicle's first token. Fails
    /// immediately, without starting a reader, if the connection cannot be opened.
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.vehicle_id))]
    pub async fn stream(&self, vehicle: &Vehicle) -> Result<TelemetryStream> {
        let request =
            StreamRequest::for_vehicle(&self.config.stream_url, self.email(), vehicle)?;
        let stream =
            TelemetryStream::open(&self.stream_client, request, &self.config.stream).await?;
        Ok(stream)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Join a path onto the API base, keeping the base path prefix
    pub(crate) fn api_url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        ))?)
    }

    pub(crate) fn vehicle_url(&self, vehicle: &Vehicle, path: &str) -> Result<Url> {
        self.api_url(&format!("vehicles/{}/{}", vehicle.id, path))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request = self.client.get(url);
        let response = self.authorized(request).await?.send().await?;
        self.handle_response::<ApiResponse<T>>(response)
            .await
            .map(|r| r.response)
    }

    /// POST and return the raw body
    pub(crate) async fn post_raw(
        &self,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = self.authorized(request).await?.send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.text().await?)
        } else {
            Err(self.extract_error(response, status).await)
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(self.access_token().await?))
    }

    /// Handle response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| TeslaClientError::ParseError(e.to_string()))
        } else {
            Err(self.extract_error(response, status).await)
        }
    }

    async fn extract_error(&self, response: reqwest::Response, status: StatusCode) -> TeslaClientError {
        let message = match response.json::<ErrorResponse>().await {
            Ok(ErrorResponse {
                error_description: Some(description),
                ..
            }) => description,
            Ok(ErrorResponse {
                error: Some(error), ..
            }) => error,
            _ => format!("HTTP {}", status),
        };

        match status {
            StatusCode::UNAUTHORIZED => TeslaClientError::Unauthorized(message),
            _ => TeslaClientError::server_error(status.as_u16(), message),
        }
    }
}
