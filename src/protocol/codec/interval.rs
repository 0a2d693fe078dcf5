//! INTERVAL DAY TO SECOND codec.
//!
//! 11 bytes on the wire: u32be days+MID, then hours/minutes/seconds each
//! offset by 60, then u32be fractional milliseconds+MID.

use crate::error::{Error, Result};
use crate::protocol::constants::{TNS_INTERVAL_MID, TNS_INTERVAL_OFFSET};
use chrono::Duration;

/// Decode an 11-byte INTERVAL DAY TO SECOND value.
pub fn decode_interval_ds(data: &[u8]) -> Result<Duration> {
    if data.len() != 11 {
        return Err(Error::protocol(format!(
            "INTERVAL DS value must be exactly 11 bytes, got {}",
            data.len()
        )));
    }

    let days = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as i64
        - TNS_INTERVAL_MID as i64;
    let hours = data[4] as i64 - TNS_INTERVAL_OFFSET as i64;
    let minutes = data[5] as i64 - TNS_INTERVAL_OFFSET as i64;
    let seconds = data[6] as i64 - TNS_INTERVAL_OFFSET as i64;
    let frac_ms = u32::from_be_bytes([data[7], data[8], data[9], data[10]]) as i64
        - TNS_INTERVAL_MID as i64;

    let total_seconds = days * 86400 + hours * 3600 + minutes * 60 + seconds;
    Ok(Duration::seconds(total_seconds) + Duration::milliseconds(frac_ms))
}

/// Encode a duration as an 11-byte INTERVAL DAY TO SECOND value.
///
/// Resolution is 1 millisecond; sub-millisecond precision is discarded.
pub fn encode_interval_ds(interval: &Duration) -> Vec<u8> {
    let total_ms = interval.num_milliseconds();
    let negative = total_ms < 0;
    let abs_ms = total_ms.unsigned_abs() as i64;

    let mut days = abs_ms / 86_400_000;
    let mut rem_ms = abs_ms % 86_400_000;
    let mut hours = rem_ms / 3_600_000;
    rem_ms %= 3_600_000;
    let mut minutes = rem_ms / 60_000;
    rem_ms %= 60_000;
    let mut seconds = rem_ms / 1000;
    let mut frac_ms = rem_ms % 1000;

    if negative {
        days = -days;
        hours = -hours;
        minutes = -minutes;
        seconds = -seconds;
        frac_ms = -frac_ms;
    }

    let mut out = Vec::with_capacity(11);
    out.extend_from_slice(&((days + TNS_INTERVAL_MID as i64) as u32).to_be_bytes());
    out.push((hours + TNS_INTERVAL_OFFSET as i64) as u8);
    out.push((minutes + TNS_INTERVAL_OFFSET as i64) as u8);
    out.push((seconds + TNS_INTERVAL_OFFSET as i64) as u8);
    out.extend_from_slice(&((frac_ms + TNS_INTERVAL_MID as i64) as u32).to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval() {
        let encoded = encode_interval_ds(&Duration::zero());
        assert_eq!(encoded.len(), 11);
        assert_eq!(decode_interval_ds(&encoded).unwrap(), Duration::zero());
    }

    #[test]
    fn test_decode_known_value() {
        // 1 day, 2 hours, 3 minutes, 4 seconds, 500 ms
        let mut data = Vec::new();
        data.extend_from_slice(&(TNS_INTERVAL_MID + 1).to_be_bytes());
        data.push(TNS_INTERVAL_OFFSET + 2);
        data.push(TNS_INTERVAL_OFFSET + 3);
        data.push(TNS_INTERVAL_OFFSET + 4);
        data.extend_from_slice(&(TNS_INTERVAL_MID + 500).to_be_bytes());

        let decoded = decode_interval_ds(&data).unwrap();
        let expect = Duration::seconds(86400 + 2 * 3600 + 3 * 60 + 4) + Duration::milliseconds(500);
        assert_eq!(decoded, expect);
    }

    #[test]
    fn test_round_trip_range() {
        // Full supported range: ±100 years of seconds, 1 ms resolution
        let century_secs: i64 = 100 * 365 * 86400;
        for secs in [
            0i64,
            1,
            -1,
            59,
            3600,
            -86400,
            86401,
            century_secs,
            -century_secs,
        ] {
            for ms in [0i64, 1, 500, 999] {
                let signed_ms = if secs < 0 { -ms } else { ms };
                let d = Duration::seconds(secs) + Duration::milliseconds(signed_ms);
                let encoded = encode_interval_ds(&d);
                assert_eq!(
                    decode_interval_ds(&encoded).unwrap(),
                    d,
                    "round trip of {}s {}ms",
                    secs,
                    signed_ms
                );
            }
        }
    }

    #[test]
    fn test_wrong_length() {
        assert!(decode_interval_ds(&[0u8; 7]).is_err());
    }
}
