//! The "60-minute" hour format.
//!
//! Elapsed time is written as `hours.minutes`, where the two fractional digits
//! are whole minutes rather than a fraction of an hour: 3 hours 9 minutes is
//! `3.09`, not `3.15`. The fractional part of a valid value is always 00..=59.
//! Negative durations carry the sign on the whole value (`-3.09`).

use std::fmt;

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Decoded form of an Hr-encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HrParts {
    pub negative: bool,
    pub hours: u64,
    pub minutes: u8,
}

impl HrParts {
    /// Re-encode into the decimal form.
    pub fn encode(&self) -> f64 {
        let value = round2(self.hours as f64 + f64::from(self.minutes) / 100.0);
        if self.negative && value != 0.0 {
            -value
        } else {
            value
        }
    }

    /// True elapsed hours (3h09m -> 3.15).
    pub fn elapsed_hours(&self) -> f64 {
        let magnitude = self.hours as f64 + f64::from(self.minutes) / 60.0;
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for HrParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{}{}h {:02}m", sign, self.hours, self.minutes)
    }
}

/// Round to two decimal digits (half away from zero).
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Encode a real number of hours. Minutes are rounded to the nearest whole
/// minute and a rounded value of 60 rolls over into the next hour.
/// Returns `None` for NaN or infinite input.
pub fn encode_hours(total_hours: f64) -> Option<f64> {
    if !total_hours.is_finite() {
        return None;
    }
    let negative = total_hours < 0.0;
    let magnitude = total_hours.abs();
    let mut whole = magnitude.trunc();
    let mut minutes = ((magnitude - whole) * 60.0).round();
    if minutes >= 60.0 {
        whole += 1.0;
        minutes = 0.0;
    }
    let value = round2(whole + minutes / 100.0);
    Some(if negative && value != 0.0 {
        -value
    } else {
        value
    })
}

/// Encode a signed number of seconds.
pub fn encode_seconds(seconds: f64) -> Option<f64> {
    encode_hours(seconds / SECONDS_PER_HOUR)
}

/// Encode whole hours and minutes, normalising minutes outside 0..=59
/// (`encode_parts(3, 60) == encode_parts(4, 0)`).
pub fn encode_parts(hours: i64, minutes: i64) -> f64 {
    let total = hours * 60 + minutes;
    let abs = total.unsigned_abs();
    HrParts {
        negative: total < 0,
        hours: abs / 60,
        minutes: (abs % 60) as u8,
    }
    .encode()
}

/// Decode an Hr-encoded value. Returns `None` for non-finite input or when the
/// two fractional digits are not a valid minute count (e.g. `1.75`).
pub fn decode(value: f64) -> Option<HrParts> {
    if !value.is_finite() {
        return None;
    }
    let hundredths = (value.abs() * 100.0).round() as u64;
    let minutes = hundredths % 100;
    if minutes > 59 {
        return None;
    }
    Some(HrParts {
        negative: value < 0.0 && hundredths != 0,
        hours: hundredths / 100,
        minutes: minutes as u8,
    })
}

/// Convert an Hr-encoded value to true elapsed hours.
pub fn to_elapsed_hours(value: f64) -> Option<f64> {
    decode(value).map(|p| p.elapsed_hours())
}
