use chrono::{Days, NaiveDate};
use thiserror::Error;

/// First serial that decodes unambiguously (1900-03-01).
pub const FIRST_UNAMBIGUOUS_SERIAL: i64 = 61;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SerialDateError {
    #[error("Serial date {0} is not a finite number")]
    NotFinite(f64),
    #[error("Serial date {0} falls before 1900-03-01 and is ambiguous")]
    Ambiguous(f64),
    #[error("Serial date {0} is out of range")]
    OutOfRange(f64),
    #[error("Date {0} cannot be encoded as an unambiguous serial")]
    Unencodable(NaiveDate),
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Decode a serial, dropping any time-of-day fraction.
pub fn decode(serial: f64) -> Result<NaiveDate, SerialDateError> {
    if !serial.is_finite() {
        return Err(SerialDateError::NotFinite(serial));
    }
    let days = serial.trunc();
    if days < FIRST_UNAMBIGUOUS_SERIAL as f64 {
        return Err(SerialDateError::Ambiguous(serial));
    }
    if days > u32::MAX as f64 {
        return Err(SerialDateError::OutOfRange(serial));
    }
    epoch()
        .checked_add_days(Days::new(days as u64))
        .ok_or(SerialDateError::OutOfRange(serial))
}

pub fn encode(date: NaiveDate) -> Result<i64, SerialDateError> {
    let serial = (date - epoch()).num_days();
    if serial < FIRST_UNAMBIGUOUS_SERIAL {
        return Err(SerialDateError::Unencodable(date));
    }
    Ok(serial)
}
