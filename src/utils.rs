//! Identifier and date helpers

use bech32::Bech32m;
use chrono::NaiveDate;
use uuid7::uuid7;

use crate::error::ValidationError;
use crate::types::CalendarDate;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Parses a `YYYY-MM-DD` date as submitted by the UI layer.
pub fn parse_date(raw: &str) -> Result<CalendarDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(CalendarDate::from)
        .map_err(|_| ValidationError::MalformedDate(raw.to_string()))
}
