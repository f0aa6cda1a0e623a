//! State command - read one vehicle state resource

use anyhow::{Context, Result};
use clap::ValueEnum;
use tesla_client::{TeslaClient, Vehicle};

use crate::output::OutputContext;

/// Which state to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateKind {
    /// Battery and charging
    Charge,
    /// Cabin climate
    Climate,
    /// Position and motion
    Drive,
    /// Display settings
    Gui,
    /// Locks, doors, software
    Vehicle,
    /// Whether remote control is enabled
    Mobile,
}

/// Read and print a vehicle state
pub async fn state(
    client: &TeslaClient,
    vehicle: &Vehicle,
    kind: StateKind,
    ctx: &OutputContext,
) -> Result<()> {
    let context = || format!("Failed to read {:?} state of {}", kind, vehicle.name());

    match kind {
        StateKind::Charge => {
            let state = client.charge_state(vehicle).await.with_context(context)?;
            ctx.print_record(&state);
        }
        StateKind::Climate => {
            let state = client.climate_state(vehicle).await.with_context(context)?;
            ctx.print_record(&state);
        }
        StateKind::Drive => {
            let state = client.drive_state(vehicle).await.with_context(context)?;
            ctx.print_record(&state);
        }
        StateKind::Gui => {
            let state = client.gui_settings(vehicle).await.with_context(context)?;
            ctx.print_record(&state);
        }
        StateKind::Vehicle => {
            let state = client.vehicle_state(vehicle).await.with_context(context)?;
            ctx.print_record(&state);
        }
        StateKind::Mobile => {
            let enabled = client.mobile_enabled(vehicle).await.with_context(context)?;
            ctx.print_record(&serde_json::json!({ "mobile_enabled": enabled }));
        }
    }

    Ok(())
}
