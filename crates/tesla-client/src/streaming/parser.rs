//! Telemetry record parser
//!
//! A record is one line of comma-separated values in a fixed positional order:
//! `timestamp,speed,odometer,soc,elevation,est_heading,est_lat,est_lng,power,shift_state,range,est_range,heading`.
//! Only the field count is structural; how bad field values are handled depends on
//! the [`ParseMode`].

use std::str::FromStr;

use chrono::DateTime;

use super::types::{ParseError, ParseMode, TelemetryEvent};

/// Number of fields in every telemetry record
pub const RECORD_FIELD_COUNT: usize = 13;

/// Parse a record, coercing unconvertible fields to zero
pub fn parse_record(line: &str) -> Result<TelemetryEvent, ParseError> {
    parse_record_with(line, ParseMode::Lenient)
}

/// Parse a record using the given conversion policy
pub fn parse_record_with(line: &str, mode: ParseMode) -> Result<TelemetryEvent, ParseError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != RECORD_FIELD_COUNT {
        return Err(ParseError::InvalidFieldCount {
            expected: RECORD_FIELD_COUNT,
            found: fields.len(),
        });
    }

    let fields = Fields { raw: &fields, mode };

    let millis: i64 = fields.number(0, "timestamp")?;
    let timestamp = match DateTime::from_timestamp_millis(millis) {
        Some(ts) => ts,
        None => fields.reject(0, "timestamp")?,
    };

    Ok(TelemetryEvent {
        timestamp,
        speed: fields.number(1, "speed")?,
        odometer: fields.number(2, "odometer")?,
        state_of_charge: fields.number(3, "soc")?,
        elevation: fields.number(4, "elevation")?,
        estimated_heading: fields.number(5, "est_heading")?,
        estimated_latitude: fields.number(6, "est_lat")?,
        estimated_longitude: fields.number(7, "est_lng")?,
        power: fields.number(8, "power")?,
        shift_state: fields.raw[9].to_string(),
        range: fields.number(10, "range")?,
        estimated_range: fields.number(11, "est_range")?,
        heading: fields.number(12, "heading")?,
    })
}

struct Fields<'a> {
    raw: &'a [&'a str],
    mode: ParseMode,
}

impl Fields<'_> {
    fn number<T: FromStr + Default>(&self, index: usize, name: &'static str) -> Result<T, ParseError> {
        match self.raw[index].parse() {
            Ok(value) => Ok(value),
            Err(_) => self.reject(index, name),
        }
    }

    /// Zero in lenient mode, an error in strict mode
    fn reject<T: Default>(&self, index: usize, name: &'static str) -> Result<T, ParseError> {
        match self.mode {
            ParseMode::Lenient => Ok(T::default()),
            ParseMode::Strict => Err(ParseError::InvalidField {
                field: name,
                value: self.raw[index].to_string(),
            }),
        }
    }
}
