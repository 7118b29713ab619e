// ABOUTME: Service Center Timestamp decoding: 7 semi-octet BCD bytes plus a signed quarter-hour timezone nibble
// ABOUTME: Algorithm grounded on the timezone-nibble and date parsing in the gsm-pdu reference decoder

use chrono::{DateTime, FixedOffset, TimeZone};
use std::fmt;

/// A decoded Service Center Timestamp: a timezone-aware instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceCenterTimestamp(pub DateTime<FixedOffset>);

impl ServiceCenterTimestamp {
    /// Decodes the 7-byte SCTS field from its 14-character upper-hex wire
    /// representation (`YYMMDDHHMMSS` as swapped-semi-octet byte pairs,
    /// followed by a signed quarter-hour timezone byte).
    pub fn decode(hex: &str) -> Result<Self, ScteError> {
        let bytes: Vec<u8> = hex.as_bytes().to_vec();
        if bytes.len() != 14 {
            return Err(ScteError::WrongLength(hex.len()));
        }

        let mut digits = String::with_capacity(12);
        for pair in bytes[..12].chunks(2) {
            digits.push(pair[1] as char);
            digits.push(pair[0] as char);
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ScteError::InvalidDigits(hex.to_string()));
        }

        let tz_zero = hex_nibble(bytes[12])?;
        let tz_one_raw = hex_nibble(bytes[13])?;
        let (tz_one, sign) = if tz_one_raw & 0b1000 != 0 {
            (tz_one_raw & 0b0111, -1i32)
        } else {
            (tz_one_raw, 1i32)
        };
        let quarter_hours = sign * (10 * i32::from(tz_one) + i32::from(tz_zero));
        let offset_seconds = quarter_hours * 15 * 60;

        let offset = FixedOffset::east_opt(offset_seconds)
            .ok_or_else(|| ScteError::InvalidTimezone(quarter_hours))?;

        let year: i32 = 2000 + digits[0..2].parse::<i32>().map_err(|_| ScteError::InvalidDigits(hex.to_string()))?;
        let month: u32 = digits[2..4].parse().map_err(|_| ScteError::InvalidDigits(hex.to_string()))?;
        let day: u32 = digits[4..6].parse().map_err(|_| ScteError::InvalidDigits(hex.to_string()))?;
        let hour: u32 = digits[6..8].parse().map_err(|_| ScteError::InvalidDigits(hex.to_string()))?;
        let minute: u32 = digits[8..10].parse().map_err(|_| ScteError::InvalidDigits(hex.to_string()))?;
        let second: u32 = digits[10..12].parse().map_err(|_| ScteError::InvalidDigits(hex.to_string()))?;

        let dt = offset
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .ok_or_else(|| ScteError::InvalidDigits(hex.to_string()))?;

        Ok(ServiceCenterTimestamp(dt))
    }
}

impl fmt::Display for ServiceCenterTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

fn hex_nibble(c: u8) -> Result<u8, ScteError> {
    (c as char)
        .to_digit(16)
        .map(|v| v as u8)
        .ok_or(ScteError::InvalidDigits(String::from_utf8_lossy(&[c]).to_string()))
}

/// Errors decoding a Service Center Timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScteError {
    WrongLength(usize),
    InvalidDigits(String),
    InvalidTimezone(i32),
}

impl fmt::Display for ScteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScteError::WrongLength(n) => write!(f, "SCTS field must be 14 hex chars, got {n}"),
            ScteError::InvalidDigits(s) => write!(f, "SCTS field is not valid BCD: {s}"),
            ScteError::InvalidTimezone(q) => write!(f, "SCTS timezone out of range: {q} quarter-hours"),
        }
    }
}

impl std::error::Error for ScteError {}
