//! Vehicles and wake commands

use anyhow::{bail, Context, Result};
use tesla_client::{TeslaClient, Vehicle};
use tracing::debug;

use crate::output::{OutputContext, VehicleRow};

/// List the vehicles on the account
pub async fn vehicles(client: &TeslaClient, ctx: &OutputContext) -> Result<()> {
    let vehicles = client.vehicles().await.context("Failed to list vehicles")?;

    let rows: Vec<VehicleRow> = vehicles
        .iter()
        .enumerate()
        .map(|(index, v)| VehicleRow::new(index, v))
        .collect();

    ctx.print(&rows);
    Ok(())
}

/// Wake the vehicle and show its refreshed record
pub async fn wake(client: &TeslaClient, vehicle: &Vehicle, ctx: &OutputContext) -> Result<()> {
    let woken = client
        .wake_up(vehicle)
        .await
        .with_context(|| format!("Failed to wake {}", vehicle.name()))?;

    ctx.print(&[VehicleRow::new(0, &woken)]);
    if woken.is_online() {
        ctx.success(&format!("{} is online", woken.name()));
    } else {
        ctx.info(&format!("{} is waking up ({})", woken.name(), woken.state));
    }
    Ok(())
}

/// Resolve `--vehicle` against the account's vehicles
pub async fn select_vehicle(client: &TeslaClient, selector: Option<&str>) -> Result<Vehicle> {
    let vehicles = client.vehicles().await.context("Failed to list vehicles")?;
    let vehicle = pick_vehicle(vehicles, selector)?;
    debug!(id = vehicle.id, vin = %vehicle.vin, "Selected vehicle");
    Ok(vehicle)
}

/// An index into the vehicle list, a VIN, or a display name; the first vehicle by default
fn pick_vehicle(mut vehicles: Vec<Vehicle>, selector: Option<&str>) -> Result<Vehicle> {
    if vehicles.is_empty() {
        bail!("No vehicles on this account");
    }

    let Some(selector) = selector else {
        return Ok(vehicles.swap_remove(0));
    };

    if let Ok(index) = selector.parse::<usize>() {
        if index < vehicles.len() {
            return Ok(vehicles.swap_remove(index));
        }
        bail!(
            "Vehicle index {} out of range ({} vehicle(s))",
            index,
            vehicles.len()
        );
    }

    vehicles
        .into_iter()
        .find(|v| {
            v.vin.eq_ignore_ascii_case(selector)
                || v.display_name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(selector))
        })
        .with_context(|| format!("No vehicle matches '{}'", selector))
}
