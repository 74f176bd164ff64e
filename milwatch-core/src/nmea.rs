//! Minimal NMEA 0183 decoding: GGA sentences to a latitude/longitude fix.

use crate::geo::Coord;

/// Decode a `$--GGA` sentence into a fix.
///
/// Returns `None` for other sentence types, bad checksums, and sentences
/// with fix quality 0 (no fix).
pub fn parse_gga(sentence: &str) -> Option<Coord> {
    let sentence = sentence.trim();
    let body = sentence.strip_prefix('$')?;

    let body = match body.split_once('*') {
        Some((data, checksum)) => {
            let expected = u8::from_str_radix(checksum.trim(), 16).ok()?;
            if nmea_checksum(data) != expected {
                return None;
            }
            data
        }
        None => body,
    };

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < 7 || fields[0].len() != 5 || !fields[0].ends_with("GGA") {
        return None;
    }

    let quality: u8 = fields[6].parse().ok()?;
    if quality == 0 {
        return None;
    }

    let lat = parse_coordinate(fields[2], fields[3], 2)?;
    let lon = parse_coordinate(fields[4], fields[5], 3)?;
    Coord::checked(lat, lon)
}

/// XOR of every byte between `$` and `*`.
fn nmea_checksum(data: &str) -> u8 {
    data.bytes().fold(0, |acc, b| acc ^ b)
}

/// `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(value: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    if value.len() <= degree_digits {
        return None;
    }
    let degrees: f64 = value.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = value.get(degree_digits..)?.parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }
    let decimal = degrees + minutes / 60.0;
    match hemisphere {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
