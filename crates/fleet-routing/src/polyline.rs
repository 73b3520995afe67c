//! Encoded polyline codec (precision 1e5)
//!
//! Each coordinate is stored as a zig-zag delta from the previous one,
//! split into 5-bit chunks with 0x20 as the continuation bit and offset
//! by 63 into printable ASCII.

/// Scale factor between degrees and encoded integers
pub const POLYLINE_PRECISION: f64 = 1e5;

const CHUNK_BITS: u32 = 5;
const CHUNK_MASK: i64 = 0x1f;
const CONTINUATION: i64 = 0x20;
const ASCII_OFFSET: i64 = 63;

/// Read one signed delta starting at `*index`.
///
/// Returns `None` on truncated or invalid input.
fn next_delta(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let chunk = i64::from(*bytes.get(*index)?) - ASCII_OFFSET;
        *index += 1;
        if !(0..64).contains(&chunk) || shift > 60 {
            return None;
        }

        result |= (chunk & CHUNK_MASK) << shift;
        shift += CHUNK_BITS;

        if chunk < CONTINUATION {
            break;
        }
    }

    Some(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

/// Decode a polyline into `[lat, lon]` pairs.
///
/// Decoding stops at the last complete coordinate pair if the input is
/// truncated or contains a character outside the encoding alphabet.
pub fn decode_polyline(encoded: &str) -> Vec<[f64; 2]> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut coordinates = Vec::new();

    while index < bytes.len() {
        let Some(dlat) = next_delta(bytes, &mut index) else {
            break;
        };
        let Some(dlon) = next_delta(bytes, &mut index) else {
            break;
        };

        lat = lat.wrapping_add(dlat);
        lon = lon.wrapping_add(dlon);
        coordinates.push([lat as f64 / POLYLINE_PRECISION, lon as f64 / POLYLINE_PRECISION]);
    }

    coordinates
}

fn push_delta(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };

    while v >= CONTINUATION {
        out.push((((v & CHUNK_MASK) | CONTINUATION) + ASCII_OFFSET) as u8 as char);
        v >>= CHUNK_BITS;
    }
    out.push((v + ASCII_OFFSET) as u8 as char);
}

/// Encode `[lat, lon]` pairs as a polyline
pub fn encode_polyline(coordinates: &[[f64; 2]]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;

    for [lat, lon] in coordinates {
        let lat = (lat * POLYLINE_PRECISION).round() as i64;
        let lon = (lon * POLYLINE_PRECISION).round() as i64;

        push_delta(lat - prev_lat, &mut out);
        push_delta(lon - prev_lon, &mut out);

        prev_lat = lat;
        prev_lon = lon;
    }

    out
}
