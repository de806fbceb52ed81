//! Field encoding conventions for GTFS cell values.
//!
//! GTFS distinguishes "not set" from "explicitly zero" for most numeric
//! fields, so every encoder here maps the unset case to an empty cell rather
//! than a literal default. Floats use Rust's `Display`, which produces the
//! shortest decimal representation that round-trips, matching what feed
//! consumers expect for coordinates and travelled distances.

use crate::feed::{ServiceDate, Time};

/// Encode an optional unsigned integer, empty when unset.
pub fn opt_u32(v: Option<u32>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Encode an optional signed integer, empty when unset.
pub fn opt_i32(v: Option<i32>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Encode an optional float with the shortest round-trip representation.
pub fn opt_f32(v: Option<f32>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Encode a signed integer whose zero value means "unset".
pub fn nonzero_i32(v: i32) -> String {
    if v == 0 { String::new() } else { v.to_string() }
}

/// Encode a float whose zero value means "unset".
pub fn nonzero_f32(v: f32) -> String {
    if v == 0.0 { String::new() } else { v.to_string() }
}

/// Encode a GTFS boolean.
///
/// With `full` set this is the tri-state form (`"1"` / `"0"`); otherwise the
/// binary-presence form (`"1"` / empty), used for flags whose absence already
/// means "no".
pub fn gtfs_bool(v: bool, full: bool) -> String {
    if v {
        "1".to_string()
    } else if full {
        "0".to_string()
    } else {
        String::new()
    }
}

/// Encode an optional service date as an 8-digit `YYYYMMDD` numeral.
pub fn opt_date(d: Option<ServiceDate>) -> String {
    match d {
        Some(d) => format!("{:04}{:02}{:02}", d.year, d.month, d.day),
        None => String::new(),
    }
}

/// Encode a time of day as zero-padded `HH:MM:SS`.
///
/// Hours past 24 are legal in GTFS (service days span midnight) and are
/// written as-is.
pub fn time(t: Time) -> String {
    format!("{:02}:{:02}:{:02}", t.hour, t.min, t.sec)
}

/// Collapse embedded newlines in free-text fields to a single space.
pub fn sanitize(s: &str) -> String {
    s.replace('\n', " ")
}
