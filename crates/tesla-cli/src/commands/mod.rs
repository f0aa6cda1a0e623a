//! Command implementations for tesla-cli

pub mod command;
pub mod state;
pub mod stream;
pub mod vehicles;

pub use command::{command, VehicleCommand};
pub use state::{state, StateKind};
pub use stream::stream;
pub use vehicles::{select_vehicle, vehicles, wake};
