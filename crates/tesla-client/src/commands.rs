//! Remote vehicle commands

use tracing::{debug, instrument};

use crate::client::TeslaClient;
use crate::error::{Result, TeslaClientError};
use crate::types::*;

impl TeslaClient {
    // =========================================================================
    // Doors, lights, horn
    // =========================================================================

    pub async fn lock_doors(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "door_lock", None).await
    }

    pub async fn unlock_doors(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "door_unlock", None).await
    }

    pub async fn flash_lights(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "flash_lights", None).await
    }

    pub async fn honk_horn(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "honk_horn", None).await
    }

    pub async fn open_trunk(&self, vehicle: &Vehicle, trunk: Trunk) -> Result<()> {
        let body = serde_json::to_value(TrunkRequest { which_trunk: trunk })
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))?;
        self.command(vehicle, "trunk_open", Some(body)).await
    }

    /// Move the panoramic roof to a preset, or to `percent` with [`RoofState::Move`]
    pub async fn move_roof(&self, vehicle: &Vehicle, state: RoofState, percent: u8) -> Result<()> {
        let body = serde_json::to_value(RoofRequest { state, percent })
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))?;
        self.command(vehicle, "sun_roof_control", Some(body)).await
    }

    pub async fn reset_valet_pin(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "reset_valet_pin", None).await
    }

    /// Enable keyless driving for two minutes
    #[instrument(skip(self, vehicle, password), fields(vehicle_id = vehicle.id))]
    pub async fn remote_start(&self, vehicle: &Vehicle, password: &str) -> Result<()> {
        let mut url = self.vehicle_url(vehicle, "command/remote_start_drive")?;
        url.query_pairs_mut().append_pair("password", password);
        self.send_command(url, None).await
    }

    // =========================================================================
    // Charging
    // =========================================================================

    pub async fn open_charge_port(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "charge_port_door_open", None).await
    }

    pub async fn start_charging(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "charge_start", None).await
    }

    pub async fn stop_charging(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "charge_stop", None).await
    }

    pub async fn set_charge_limit(&self, vehicle: &Vehicle, percent: u8) -> Result<()> {
        let body = serde_json::to_value(ChargeLimitRequest { percent })
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))?;
        self.command(vehicle, "set_charge_limit", Some(body)).await
    }

    pub async fn set_charge_limit_max(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "charge_max_range", None).await
    }

    pub async fn set_charge_limit_standard(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "charge_standard", None).await
    }

    // =========================================================================
    // Climate
    // =========================================================================

    pub async fn start_air_conditioning(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "auto_conditioning_start", None).await
    }

    pub async fn stop_air_conditioning(&self, vehicle: &Vehicle) -> Result<()> {
        self.command(vehicle, "auto_conditioning_stop", None).await
    }

    /// Set driver and passenger temperatures (Celsius)
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    pub async fn set_temperature(&self, vehicle: &Vehicle, driver: f64, passenger: f64) -> Result<()> {
        let mut url = self.vehicle_url(vehicle, "command/set_temps")?;
        url.query_pairs_mut()
            .append_pair("driver_temp", &driver.to_string())
            .append_pair("passenger_temp", &passenger.to_string());
        self.send_command(url, None).await
    }

    // =========================================================================
    // Summon / HomeLink
    // =========================================================================

    pub async fn autopark_abort(&self, vehicle: &Vehicle) -> Result<()> {
        self.autopark(vehicle, AutoParkAction::Abort).await
    }

    pub async fn autopark_forward(&self, vehicle: &Vehicle) -> Result<()> {
        self.autopark(vehicle, AutoParkAction::StartForward).await
    }

    pub async fn autopark_reverse(&self, vehicle: &Vehicle) -> Result<()> {
        self.autopark(vehicle, AutoParkAction::StartReverse).await
    }

    /// Summon request at the car's current position
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    async fn autopark(&self, vehicle: &Vehicle, action: AutoParkAction) -> Result<()> {
        let drive = self.drive_state(vehicle).await?;
        let request = AutoParkRequest {
            action: Some(action),
            lat: drive.latitude,
            lon: drive.longitude,
            vehicle_id: Some(vehicle.vehicle_id),
        };
        let body = serde_json::to_value(request)
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))?;
        self.command(vehicle, "autopark_request", Some(body)).await
    }

    /// Toggle the HomeLink garage door opener near the car's position
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    pub async fn toggle_homelink(&self, vehicle: &Vehicle) -> Result<()> {
        let drive = self.drive_state(vehicle).await?;
        let request = AutoParkRequest {
            action: None,
            lat: drive.latitude,
            lon: drive.longitude,
            vehicle_id: None,
        };
        let body = serde_json::to_value(request)
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))?;
        self.command(vehicle, "trigger_homelink", Some(body)).await
    }

    // =========================================================================
    // Wake
    // =========================================================================

    /// Wake a sleeping vehicle and return its refreshed record
    #[instrument(skip(self, vehicle), fields(vehicle_id = vehicle.id))]
    pub async fn wake_up(&self, vehicle: &Vehicle) -> Result<Vehicle> {
        let url = self.vehicle_url(vehicle, "wake_up")?;
        let body = self.post_raw(url, None).await?;
        serde_json::from_str::<ApiResponse<Vehicle>>(&body)
            .map(|r| r.response)
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    #[instrument(skip(self, vehicle, body), fields(vehicle_id = vehicle.id))]
    async fn command(
        &self,
        vehicle: &Vehicle,
        name: &str,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        let url = self.vehicle_url(vehicle, &format!("command/{}", name))?;
        self.send_command(url, body).await
    }

    /// POST a command and check its `result`
    ///
    /// An empty body counts as success. A `false` result is an error only when the
    /// vehicle gives a reason.
    async fn send_command(&self, url: url::Url, body: Option<serde_json::Value>) -> Result<()> {
        debug!("Sending command to {}", url.path());
        let text = self.post_raw(url, body).await?;
        if text.trim().is_empty() {
            return Ok(());
        }

        let response: ApiResponse<CommandResult> = serde_json::from_str(&text)
            .map_err(|e| TeslaClientError::ParseError(e.to_string()))?;
        check_command(response.response)
    }
}

fn check_command(result: CommandResult) -> Result<()> {
    if !result.result && !result.reason.is_empty() {
        return Err(TeslaClientError::CommandFailed(result.reason));
    }
    Ok(())
}
