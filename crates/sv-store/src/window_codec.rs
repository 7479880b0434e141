//! Wire format for persisted time-series windows.
//!
//! Windows are serialized as a length-prefixed binary frame of columnar
//! arrays `(timestamps[], values[])` rather than JSON, since they are
//! written on every scheduled persistence tick and a flat frame of
//! fixed-width fields is cheaper to encode/decode than a tagged format.
//!
//! Layout: `u32 count` (little-endian), followed by `count` i64 millisecond
//! timestamps, followed by `count` f64 values.

use chrono::{DateTime, TimeZone, Utc};
use sv_common::{Reading, Window};

use crate::error::{Result, StoreError};

pub fn encode(window: &Window) -> Vec<u8> {
    let count = window.readings.len();
    let mut buf = Vec::with_capacity(4 + count * 16);
    buf.extend_from_slice(&(count as u32).to_le_bytes());
    for reading in &window.readings {
        buf.extend_from_slice(&reading.timestamp.timestamp_millis().to_le_bytes());
    }
    for reading in &window.readings {
        buf.extend_from_slice(&reading.value.to_le_bytes());
    }
    buf
}

pub fn decode(bytes: &[u8]) -> Result<Window> {
    if bytes.len() < 4 {
        return Err(StoreError::MalformedFrame(
            "frame shorter than the count prefix".to_string(),
        ));
    }
    let count = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let timestamps_start = 4;
    let timestamps_end = timestamps_start + count * 8;
    let values_end = timestamps_end + count * 8;
    if bytes.len() < values_end {
        return Err(StoreError::MalformedFrame(format!(
            "frame declares {count} readings but is too short"
        )));
    }

    let mut timestamps = Vec::with_capacity(count);
    for i in 0..count {
        let start = timestamps_start + i * 8;
        let millis = i64::from_le_bytes(bytes[start..start + 8].try_into().unwrap());
        let ts: DateTime<Utc> = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| StoreError::MalformedFrame(format!("invalid timestamp {millis}")))?;
        timestamps.push(ts);
    }

    let mut readings = Vec::with_capacity(count);
    for i in 0..count {
        let start = timestamps_end + i * 8;
        let value = f64::from_le_bytes(bytes[start..start + 8].try_into().unwrap());
        readings.push(Reading::at(timestamps[i], value));
    }

    Ok(Window { readings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_window() {
        let mut window = Window::new();
        let t0 = Utc::now();
        window.push(Reading::at(t0, 1.0));
        window.push(Reading::at(t0 + chrono::Duration::seconds(1), 2.5));

        let encoded = encode(&window);
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded.readings.len(), 2);
        assert_eq!(decoded.readings[0].value, 1.0);
        assert_eq!(decoded.readings[1].value, 2.5);
        assert_eq!(
            decoded.readings[0].timestamp.timestamp_millis(),
            t0.timestamp_millis()
        );
    }

    #[test]
    fn round_trips_an_empty_window() {
        let window = Window::new();
        let encoded = encode(&window);
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn rejects_truncated_frame() {
        let bytes = vec![2, 0, 0, 0, 1, 2, 3];
        assert!(decode(&bytes).is_err());
    }
}
