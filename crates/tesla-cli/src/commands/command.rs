//! Command command - send a remote command to the vehicle

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use tesla_client::{RoofState, TeslaClient, Trunk, Vehicle};

use crate::output::OutputContext;

/// Remote commands
#[derive(Debug, Clone, Subcommand)]
pub enum VehicleCommand {
    /// Lock the doors
    Lock,
    /// Unlock the doors
    Unlock,
    /// Flash the headlights
    Flash,
    /// Honk the horn
    Honk,
    /// Open the front or rear trunk
    Trunk {
        #[arg(value_enum)]
        which: TrunkArg,
    },
    /// Move the panoramic roof
    Roof {
        #[arg(value_enum)]
        state: RoofArg,
        /// Open percentage, used with `move`
        #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Reset the valet PIN
    ResetValetPin,
    /// Allow keyless driving for two minutes (uses the account password)
    RemoteStart,
    /// Open the charge port door
    ChargePort,
    /// Start charging
    ChargeStart,
    /// Stop charging
    ChargeStop,
    /// Set the charge limit
    ChargeLimit {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Charge to maximum range
    ChargeMax,
    /// Charge to the standard limit
    ChargeStandard,
    /// Start climate control
    ClimateOn,
    /// Stop climate control
    ClimateOff,
    /// Set driver and passenger temperatures (Celsius)
    Temps { driver: f64, passenger: f64 },
    /// Summon the vehicle
    Autopark {
        #[arg(value_enum)]
        direction: AutoparkArg,
    },
    /// Trigger HomeLink at the vehicle's position
    Homelink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrunkArg {
    Front,
    Rear,
}

impl From<TrunkArg> for Trunk {
    fn from(arg: TrunkArg) -> Self {
        match arg {
            TrunkArg::Front => Trunk::Front,
            TrunkArg::Rear => Trunk::Rear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoofArg {
    Open,
    Close,
    Comfort,
    Vent,
    Move,
}

impl From<RoofArg> for RoofState {
    fn from(arg: RoofArg) -> Self {
        match arg {
            RoofArg::Open => RoofState::Open,
            RoofArg::Close => RoofState::Close,
            RoofArg::Comfort => RoofState::Comfort,
            RoofArg::Vent => RoofState::Vent,
            RoofArg::Move => RoofState::Move,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AutoparkArg {
    Forward,
    Reverse,
    Abort,
}

/// Send a command and report the outcome
pub async fn command(
    client: &TeslaClient,
    vehicle: &Vehicle,
    action: &VehicleCommand,
    password: Option<&str>,
    ctx: &OutputContext,
) -> Result<()> {
    let result = match action {
        VehicleCommand::Lock => client.lock_doors(vehicle).await,
        VehicleCommand::Unlock => client.unlock_doors(vehicle).await,
        VehicleCommand::Flash => client.flash_lights(vehicle).await,
        VehicleCommand::Honk => client.honk_horn(vehicle).await,
        VehicleCommand::Trunk { which } => client.open_trunk(vehicle, (*which).into()).await,
        VehicleCommand::Roof { state, percent } => {
            client.move_roof(vehicle, (*state).into(), *percent).await
        }
        VehicleCommand::ResetValetPin => client.reset_valet_pin(vehicle).await,
        VehicleCommand::RemoteStart => {
            let password = password.context("Remote start needs the account password")?;
            client.remote_start(vehicle, password).await
        }
        VehicleCommand::ChargePort => client.open_charge_port(vehicle).await,
        VehicleCommand::ChargeStart => client.start_charging(vehicle).await,
        VehicleCommand::ChargeStop => client.stop_charging(vehicle).await,
        VehicleCommand::ChargeLimit { percent } => {
            client.set_charge_limit(vehicle, *percent).await
        }
        VehicleCommand::ChargeMax => client.set_charge_limit_max(vehicle).await,
        VehicleCommand::ChargeStandard => client.set_charge_limit_standard(vehicle).await,
        VehicleCommand::ClimateOn => client.start_air_conditioning(vehicle).await,
        VehicleCommand::ClimateOff => client.stop_air_conditioning(vehicle).await,
        VehicleCommand::Temps { driver, passenger } => {
            client.set_temperature(vehicle, *driver, *passenger).await
        }
        VehicleCommand::Autopark { direction } => match direction {
            AutoparkArg::Forward => client.autopark_forward(vehicle).await,
            AutoparkArg::Reverse => client.autopark_reverse(vehicle).await,
            AutoparkArg::Abort => client.autopark_abort(vehicle).await,
        },
        VehicleCommand::Homelink => client.toggle_homelink(vehicle).await,
    };

    result.with_context(|| format!("{:?} failed on {}", action, vehicle.name()))?;
    ctx.success(&format!("{:?}: OK", action));
    Ok(())
}
