//! Request and response types for the owner API

use serde::{Deserialize, Serialize};

// =============================================================================
// Envelopes
// =============================================================================

/// Every owner API response wraps its payload in `response`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub response: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Error body returned by the owner API
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

// =============================================================================
// Vehicle
// =============================================================================

/// A vehicle on the account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Identifier used in REST paths
    pub id: u64,
    #[serde(default)]
    pub id_s: String,
    /// Identifier used by the streaming endpoint
    pub vehicle_id: u64,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub option_codes: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Streaming tokens; the first one authenticates the stream
    #[serde(default)]
    pub tokens: Vec<String>,
    /// `online`, `asleep`, `offline`
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub calendar_enabled: bool,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub remote_start_enabled: bool,
    #[serde(default)]
    pub backseat_token: Option<String>,
    #[serde(default)]
    pub backseat_token_updated_at: Option<i64>,
}

impl Vehicle {
    /// Display name, falling back to the VIN
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.vin)
    }

    pub fn is_online(&self) -> bool {
        self.state == "online"
    }
}

// =============================================================================
// States
// =============================================================================

/// Battery and charging state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeState {
    pub battery_current: Option<f64>,
    pub battery_heater_on: Option<bool>,
    pub battery_level: i32,
    pub battery_range: f64,
    pub charge_current_request: i32,
    pub charge_current_request_max: i32,
    pub charge_enable_request: bool,
    pub charge_energy_added: f64,
    pub charge_limit_soc: i32,
    pub charge_limit_soc_max: i32,
    pub charge_limit_soc_min: i32,
    pub charge_limit_soc_std: i32,
    pub charge_miles_added_ideal: f64,
    pub charge_miles_added_rated: f64,
    pub charge_port_door_open: Option<bool>,
    pub charge_port_latch: Option<String>,
    pub charge_rate: f64,
    pub charge_to_max_range: bool,
    pub charger_actual_current: Option<f64>,
    pub charger_phases: Option<i32>,
    pub charger_pilot_current: Option<f64>,
    pub charger_power: Option<f64>,
    pub charger_voltage: Option<f64>,
    pub charging_state: Option<String>,
    pub est_battery_range: f64,
    pub eu_vehicle: bool,
    pub fast_charger_present: Option<bool>,
    pub fast_charger_type: Option<String>,
    pub ideal_battery_range: f64,
    pub managed_charging_active: bool,
    pub managed_charging_start_time: Option<i64>,
    pub managed_charging_user_canceled: bool,
    pub max_range_charge_counter: i32,
    pub motorized_charge_port: bool,
    pub not_enough_power_to_heat: Option<bool>,
    pub scheduled_charging_pending: bool,
    pub scheduled_charging_start_time: Option<i64>,
    pub time_to_full_charge: f64,
    pub trip_charging: Option<bool>,
    pub usable_battery_level: i32,
    pub user_charge_enable_request: Option<bool>,
}

/// Cabin climate state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateState {
    pub driver_temp_setting: f64,
    pub fan_status: Option<i32>,
    pub inside_temp: Option<f64>,
    pub is_auto_conditioning_on: Option<bool>,
    pub is_climate_on: bool,
    pub is_front_defroster_on: Option<bool>,
    pub is_rear_defroster_on: Option<bool>,
    pub left_temp_direction: Option<f64>,
    pub max_avail_temp: f64,
    pub min_avail_temp: f64,
    pub outside_temp: Option<f64>,
    pub passenger_temp_setting: f64,
    pub right_temp_direction: Option<f64>,
    pub seat_heater_left: i32,
    pub seat_heater_rear_center: i32,
    pub seat_heater_rear_left: i32,
    pub seat_heater_rear_left_back: i32,
    pub seat_heater_rear_right: i32,
    pub seat_heater_rear_right_back: i32,
    pub seat_heater_right: i32,
    pub smart_preconditioning: bool,
}

/// Position and motion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveState {
    pub gps_as_of: i64,
    pub heading: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub shift_state: Option<String>,
    pub speed: Option<f64>,
}

/// Display units and formats configured in the car
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiSettings {
    pub gui_24_hour_time: bool,
    pub gui_charge_rate_units: String,
    pub gui_distance_units: String,
    pub gui_range_display: String,
    pub gui_temperature_units: String,
}

/// Body, locks, software and trim state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    pub api_version: i32,
    pub autopark_state: Option<String>,
    pub autopark_state_v2: Option<String>,
    pub calendar_supported: bool,
    pub car_type: String,
    pub car_version: String,
    pub center_display_state: i32,
    pub dark_rims: bool,
    /// Driver front door
    pub df: i32,
    /// Driver rear door
    pub dr: i32,
    pub exterior_color: Option<String>,
    /// Front trunk
    pub ft: i32,
    pub has_spoiler: bool,
    pub locked: bool,
    pub notifications_supported: bool,
    pub odometer: f64,
    pub parsed_calendar_supported: bool,
    pub perf_config: Option<String>,
    /// Passenger front door
    pub pf: i32,
    /// Passenger rear door
    pub pr: i32,
    pub rear_seat_heaters: i32,
    pub remote_start: bool,
    pub remote_start_supported: bool,
    pub rhd: bool,
    pub roof_color: Option<String>,
    /// Rear trunk
    pub rt: i32,
    pub seat_type: i32,
    pub spoiler_type: Option<String>,
    pub sun_roof_installed: i32,
    pub sun_roof_percent_open: i32,
    pub sun_roof_state: Option<String>,
    pub third_row_seats: Option<String>,
    pub valet_mode: bool,
    pub vehicle_name: Option<String>,
    pub wheel_type: Option<String>,
}

/// `data_request` resources, one per state type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateResource {
    Charge,
    Climate,
    Drive,
    Gui,
    Vehicle,
}

impl StateResource {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Charge => "charge_state",
            Self::Climate => "climate_state",
            Self::Drive => "drive_state",
            Self::Gui => "gui_settings",
            Self::Vehicle => "vehicle_state",
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Result of a vehicle command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub reason: String,
}

/// Body for `autopark_request` and `trigger_homelink`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoParkRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AutoParkAction>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<u64>,
}

/// Summon movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoParkAction {
    Abort,
    StartForward,
    StartReverse,
}

/// Panoramic roof presets
///
/// Open is 100%, comfort 80%, vent 15%, close 0%. `Move` uses the percent
/// passed alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoofState {
    Open,
    Close,
    Comfort,
    Vent,
    Move,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RoofRequest {
    pub state: RoofState,
    pub percent: u8,
}

/// Which trunk to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trunk {
    Front,
    Rear,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TrunkRequest {
    pub which_trunk: Trunk,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChargeLimitRequest {
    pub percent: u8,
}
