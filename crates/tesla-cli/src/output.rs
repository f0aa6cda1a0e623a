//! Output formatting for tesla-cli (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};
use tesla_client::{TelemetryEvent, Vehicle};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data);
            }
        }
    }

    /// Print every field of a record, sorted by name
    pub fn print_record<T: Serialize>(&self, record: &T) {
        let value = serde_json::to_value(record).unwrap_or_default();
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table => {
                if let serde_json::Value::Object(map) = &value {
                    let width = map.keys().map(String::len).max().unwrap_or(0);
                    for (key, field) in map {
                        let key = format!("{:width$}", key, width = width);
                        println!("{}  {}", key.bold(), format_json_value(field));
                    }
                }
            }
            OutputFormat::Csv => {
                print_csv(&[record]);
            }
        }
    }
}

/// Print data as CSV
pub fn print_csv<T: Serialize>(data: &[T]) {
    if data.is_empty() {
        return;
    }

    // Get field names from the first item
    let first = serde_json::to_value(&data[0]).unwrap_or_default();
    if let serde_json::Value::Object(map) = &first {
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        println!("{}", headers.join(","));

        for item in data {
            print_csv_row(item, &headers);
        }
    }
}

/// Print one CSV row with columns in header order
pub fn print_csv_row<T: Serialize>(item: &T, headers: &[&str]) {
    if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
        let values: Vec<String> = headers
            .iter()
            .map(|h| {
                row.get(*h)
                    .map(|v| escape_csv(&format_json_value(v)))
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", values.join(","));
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn format_json_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Vehicle display for vehicles command
#[derive(Debug, Tabled, Serialize)]
pub struct VehicleRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "ID")]
    pub id: u64,
    #[tabled(rename = "Vehicle ID")]
    pub vehicle_id: u64,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "VIN")]
    pub vin: String,
    #[tabled(rename = "State")]
    pub state: String,
}

impl VehicleRow {
    pub fn new(index: usize, vehicle: &Vehicle) -> Self {
        Self {
            index,
            id: vehicle.id,
            vehicle_id: vehicle.vehicle_id,
            name: vehicle.name().to_string(),
            vin: vehicle.vin.clone(),
            state: vehicle.state.clone(),
        }
    }
}

/// Telemetry display for stream command
#[derive(Debug, Tabled, Serialize)]
pub struct TelemetryRow {
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Speed")]
    pub speed: i32,
    #[tabled(rename = "Gear")]
    pub shift_state: String,
    #[tabled(rename = "SoC")]
    pub soc: i32,
    #[tabled(rename = "Power")]
    pub power: i32,
    #[tabled(rename = "Range")]
    pub range: i32,
    #[tabled(rename = "Odometer")]
    pub odometer: f64,
    #[tabled(rename = "Lat")]
    pub latitude: f64,
    #[tabled(rename = "Lng")]
    pub longitude: f64,
    #[tabled(rename = "Heading")]
    pub heading: i32,
}

impl From<&TelemetryEvent> for TelemetryRow {
    fn from(event: &TelemetryEvent) -> Self {
        Self {
            time: event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            speed: event.speed,
            shift_state: if event.shift_state.is_empty() {
                "-".to_string()
            } else {
                event.shift_state.clone()
            },
            soc: event.state_of_charge,
            power: event.power,
            range: event.range,
            odometer: event.odometer,
            latitude: event.estimated_latitude,
            longitude: event.estimated_longitude,
            heading: event.heading,
        }
    }
}
