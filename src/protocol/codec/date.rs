//! Oracle DATE and TIMESTAMP codec.
//!
//! The 7-byte base encodes (century+100, year%100+100, month, day, hour+1,
//! minute+1, second+1). TIMESTAMP adds a big-endian u32 fractional value in
//! bytes 7-10; TIMESTAMP WITH TIME ZONE adds two offset bytes. The high bit
//! of the timezone hour byte marks a region-id zone, which this driver does
//! not resolve.

use crate::error::{Error, Result};
use crate::protocol::constants::{TZ_HOUR_OFFSET, TZ_MINUTE_OFFSET};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// A decoded TIMESTAMP value with its optional fixed-offset timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampValue {
    /// Date and time, including nanoseconds.
    pub datetime: NaiveDateTime,
    /// Timezone offset in minutes east of UTC, when present on the wire.
    pub tz_offset_minutes: Option<i32>,
}

/// Decode an Oracle DATE from exactly 7 bytes.
pub fn decode_date(data: &[u8]) -> Result<NaiveDateTime> {
    if data.len() != 7 {
        return Err(Error::protocol(format!(
            "DATE value must be exactly 7 bytes, got {}",
            data.len()
        )));
    }
    let ts = decode_timestamp(data)?;
    Ok(ts.datetime)
}

/// Decode an Oracle DATE/TIMESTAMP value of 7, 11 or 13 bytes.
pub fn decode_timestamp(data: &[u8]) -> Result<TimestampValue> {
    if data.len() < 7 {
        return Err(Error::protocol(format!(
            "Timestamp value must be at least 7 bytes, got {}",
            data.len()
        )));
    }

    let century = (data[0] as i32) - 100;
    let year_in_century = (data[1] as i32) - 100;
    let year = century * 100 + year_in_century;

    let month = data[2];
    let day = data[3];
    let hour = data[4].wrapping_sub(1);
    let minute = data[5].wrapping_sub(1);
    let second = data[6].wrapping_sub(1);

    if !(1..=12).contains(&month) {
        return Err(Error::protocol(format!("Invalid month: {}", month)));
    }
    if !(1..=31).contains(&day) {
        return Err(Error::protocol(format!("Invalid day: {}", day)));
    }
    if hour > 23 {
        return Err(Error::protocol(format!("Invalid hour: {}", hour)));
    }
    if minute > 59 {
        return Err(Error::protocol(format!("Invalid minute: {}", minute)));
    }
    if second > 59 {
        return Err(Error::protocol(format!("Invalid second: {}", second)));
    }

    let nanos = if data.len() >= 11 {
        let frac = u32::from_be_bytes([data[7], data[8], data[9], data[10]]);
        frac.saturating_mul(1_000_000)
    } else {
        0
    };

    let tz_offset_minutes = if data.len() >= 13 {
        if data[11] & 0x80 != 0 {
            // Region-id encoding needs a timezone database the wire does
            // not carry
            return Err(Error::NamedTimeZoneNotSupported);
        }
        let tz_hours = (data[11] & 0x3f) as i32 - TZ_HOUR_OFFSET as i32;
        let tz_minutes = data[12] as i32 - TZ_MINUTE_OFFSET as i32;
        Some(tz_hours * 60 + tz_minutes)
    } else {
        None
    };

    let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(|| {
        Error::protocol(format!(
            "Invalid DATE: year={}, month={}, day={}",
            year, month, day
        ))
    })?;
    let time = NaiveTime::from_hms_nano_opt(hour as u32, minute as u32, second as u32, nanos)
        .ok_or_else(|| {
            Error::protocol(format!(
                "Invalid TIME: hour={}, minute={}, second={}",
                hour, minute, second
            ))
        })?;

    Ok(TimestampValue {
        datetime: NaiveDateTime::new(date, time),
        tz_offset_minutes,
    })
}

/// Encode an Oracle DATE (7 bytes, no fractional seconds).
pub fn encode_date(dt: &NaiveDateTime) -> [u8; 7] {
    let year = dt.year();
    [
        (year / 100 + 100) as u8,
        (year % 100 + 100) as u8,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8 + 1,
        dt.minute() as u8 + 1,
        dt.second() as u8 + 1,
    ]
}

/// Encode an Oracle TIMESTAMP (11 bytes, or 13 with a timezone offset).
///
/// Fractional seconds are transmitted at millisecond granularity.
pub fn encode_timestamp(dt: &NaiveDateTime, tz_offset_minutes: Option<i32>) -> Vec<u8> {
    let mut out = Vec::with_capacity(13);
    out.extend_from_slice(&encode_date(dt));
    let frac = dt.nanosecond() / 1_000_000;
    out.extend_from_slice(&frac.to_be_bytes());
    if let Some(offset) = tz_offset_minutes {
        let hours = offset.div_euclid(60);
        let minutes = offset.rem_euclid(60);
        out.push((hours + TZ_HOUR_OFFSET as i32) as u8);
        out.push((minutes + TZ_MINUTE_OFFSET as i32) as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_date_2024_10_21() {
        // 2024-10-21 12:36:05
        let data = [0x78, 0x7C, 0x0A, 0x15, 0x0D, 0x25, 0x06];
        let result = decode_date(&data).unwrap();
        assert_eq!(result.year(), 2024);
        assert_eq!(result.month(), 10);
        assert_eq!(result.day(), 21);
        assert_eq!(result.hour(), 12);
        assert_eq!(result.minute(), 36);
        assert_eq!(result.second(), 5);
    }

    #[test]
    fn test_decode_date_midnight() {
        let data = [0x78, 0x7C, 0x01, 0x0F, 0x01, 0x01, 0x01];
        let result = decode_date(&data).unwrap();
        assert_eq!(result.year(), 2024);
        assert_eq!(result.hour(), 0);
        assert_eq!(result.minute(), 0);
        assert_eq!(result.second(), 0);
    }

    #[test]
    fn test_decode_date_1999() {
        let data = [0x77, 0xC7, 0x06, 0x0F, 0x0D, 0x1F, 0x2E];
        let result = decode_date(&data).unwrap();
        assert_eq!(result.year(), 1999);
        assert_eq!(result.month(), 6);
        assert_eq!(result.day(), 15);
    }

    #[test]
    fn test_decode_date_wrong_length() {
        assert!(decode_date(&[0x78, 0x7C, 0x0A]).is_err());
    }

    #[test]
    fn test_decode_date_invalid_month() {
        let data = [0x78, 0x7C, 0x0D, 0x0F, 0x01, 0x01, 0x01];
        assert!(decode_date(&data).is_err());
    }

    #[test]
    fn test_date_round_trip() {
        let dt = NaiveDate::from_ymd_opt(2024, 10, 21)
            .unwrap()
            .and_hms_opt(12, 36, 5)
            .unwrap();
        let encoded = encode_date(&dt);
        assert_eq!(decode_date(&encoded).unwrap(), dt);
    }

    #[test]
    fn test_timestamp_round_trip_with_fraction() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(8, 30, 45, 123)
            .unwrap();
        let encoded = encode_timestamp(&dt, None);
        assert_eq!(encoded.len(), 11);
        let decoded = decode_timestamp(&encoded).unwrap();
        assert_eq!(decoded.datetime, dt);
        assert_eq!(decoded.tz_offset_minutes, None);
    }

    #[test]
    fn test_timestamp_tz_round_trip() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        for offset in [0, 120, -300, 330, -570] {
            let encoded = encode_timestamp(&dt, Some(offset));
            assert_eq!(encoded.len(), 13);
            let decoded = decode_timestamp(&encoded).unwrap();
            assert_eq!(decoded.datetime, dt);
            assert_eq!(decoded.tz_offset_minutes, Some(offset), "offset {}", offset);
        }
    }

    #[test]
    fn test_named_timezone_rejected() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut encoded = encode_timestamp(&dt, Some(0));
        encoded[11] |= 0x80;
        assert!(matches!(
            decode_timestamp(&encoded),
            Err(Error::NamedTimeZoneNotSupported)
        ));
    }
}
