//! Oracle NUMBER codec.
//!
//! Oracle NUMBER is a variable-length format:
//! - First byte is the exponent (bias 193, bit-inverted for negatives)
//! - Remaining bytes are base-100 mantissa digit pairs (offset +1 when
//!   positive, 101 - d when negative, optional 0x66 terminator)
//! - Zero is the single byte 0x80

use crate::error::{Error, Result};
use crate::protocol::constants::TNS_NUMBER_MAX_DIGITS;

/// Decode Oracle NUMBER format to decimal text.
///
/// Preserves full precision by returning the number as a string.
/// Use `.parse::<i64>()` or `.parse::<f64>()` to convert.
pub fn decode_number(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Ok("0".to_string());
    }

    let exp_byte = bytes[0];
    let is_positive = (exp_byte & 0x80) != 0;

    let exponent: i16 = if is_positive {
        exp_byte as i16 - 193
    } else {
        (!exp_byte) as i16 - 193
    };

    // Where the decimal point lands in the expanded digit string
    let mut decimal_point_index: i16 = exponent * 2 + 2;

    if bytes.len() == 1 {
        if is_positive {
            return Ok("0".to_string());
        } else {
            // Negative infinity marker
            return Ok("-1e126".to_string());
        }
    }

    // Negative numbers may carry a trailing 102 sentinel
    let mantissa_end = if !is_positive && bytes[bytes.len() - 1] == 102 {
        bytes.len() - 1
    } else {
        bytes.len()
    };

    let mut digits: Vec<u8> = Vec::with_capacity((mantissa_end - 1) * 2);

    for (i, &byte) in bytes.iter().enumerate().take(mantissa_end).skip(1) {
        let digit_pair = if is_positive {
            byte.wrapping_sub(1)
        } else {
            101u8.wrapping_sub(byte)
        };

        let d1 = digit_pair / 10;
        let d2 = digit_pair % 10;

        if digits.is_empty() && d1 == 0 {
            // Leading zero shifts the decimal point left
            decimal_point_index -= 1;
            if d2 != 0 || i < mantissa_end - 1 {
                digits.push(d2);
            } else if d2 == 0 {
                decimal_point_index -= 1;
            }
        } else if d1 == 10 {
            digits.push(1);
            digits.push(0);
            decimal_point_index += 1;
        } else {
            digits.push(d1);
            if d2 != 0 || i < mantissa_end - 1 {
                digits.push(d2);
            }
        }
    }

    while !digits.is_empty() && digits[digits.len() - 1] == 0 {
        digits.pop();
    }

    if digits.is_empty() {
        return Ok("0".to_string());
    }

    let mut result = String::new();

    if !is_positive {
        result.push('-');
    }

    let num_digits = digits.len() as i16;

    if decimal_point_index <= 0 {
        result.push('0');
        result.push('.');
        for _ in decimal_point_index..0 {
            result.push('0');
        }
        for d in &digits {
            result.push((b'0' + d) as char);
        }
    } else if decimal_point_index >= num_digits {
        for d in &digits {
            result.push((b'0' + d) as char);
        }
        for _ in num_digits..decimal_point_index {
            result.push('0');
        }
    } else {
        for (i, d) in digits.iter().enumerate() {
            if i as i16 == decimal_point_index {
                result.push('.');
            }
            result.push((b'0' + d) as char);
        }
    }

    Ok(result)
}

/// Parsed shape of a decimal text value, prior to base-100 packing.
struct DecimalText {
    negative: bool,
    /// Significant digits with no leading or trailing zeros.
    digits: Vec<u8>,
    /// Decimal point position: value = 0.digits × 10^point
    point: i32,
}

fn parse_decimal_text(text: &str) -> Result<DecimalText> {
    let bytes = text.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let mut digits: Vec<u8> = Vec::new();
    let mut point: i32 = 0;
    let mut seen_point = false;
    let mut seen_digit = false;

    while pos < bytes.len() {
        match bytes[pos] {
            b'0'..=b'9' => {
                seen_digit = true;
                let d = bytes[pos] - b'0';
                if digits.is_empty() && d == 0 {
                    // Leading zero: only shifts the point once past the dot
                    if seen_point {
                        point -= 1;
                    }
                } else {
                    digits.push(d);
                    if !seen_point {
                        point += 1;
                    }
                }
                pos += 1;
            }
            b'.' if !seen_point => {
                seen_point = true;
                pos += 1;
            }
            b'e' | b'E' => {
                let exp_text = &text[pos + 1..];
                if exp_text.is_empty() {
                    return Err(Error::type_conversion(format!("invalid number: {}", text)));
                }
                let exp: i32 = exp_text
                    .parse()
                    .map_err(|_| Error::type_conversion(format!("invalid number: {}", text)))?;
                point = point
                    .checked_add(exp)
                    .ok_or_else(|| Error::NumberOverflow { text: text.into() })?;
                pos = bytes.len();
            }
            _ => {
                return Err(Error::type_conversion(format!("invalid number: {}", text)));
            }
        }
    }

    if !seen_digit {
        return Err(Error::type_conversion(format!("invalid number: {}", text)));
    }

    while digits.last() == Some(&0) {
        digits.pop();
    }

    Ok(DecimalText {
        negative,
        digits,
        point,
    })
}

/// Encode decimal text into Oracle NUMBER bytes.
///
/// Accepts optional sign, fractional point and scientific exponent.
/// Values outside the representable range (more than 40 significant
/// digits, or magnitude beyond the base-100 exponent range) return
/// [`Error::NumberOverflow`]; `-0.00` encodes as zero.
pub fn encode_number(text: &str) -> Result<Vec<u8>> {
    let parsed = parse_decimal_text(text)?;

    if parsed.digits.is_empty() {
        // All zeros, sign irrelevant
        return Ok(vec![0x80]);
    }
    if parsed.digits.len() > TNS_NUMBER_MAX_DIGITS {
        return Err(Error::NumberOverflow { text: text.into() });
    }

    // Align to base-100 pairs: a leading zero pad when the point is odd
    let mut digits = parsed.digits;
    let mut point = parsed.point;
    if point.rem_euclid(2) != 0 {
        digits.insert(0, 0);
        point += 1;
    }
    if digits.len() % 2 != 0 {
        digits.push(0);
    }

    // value = mantissa-pairs × 100^(exponent - pair-index)
    let exponent = point / 2 - 1;
    if !(-65..=62).contains(&exponent) {
        return Err(Error::NumberOverflow { text: text.into() });
    }

    let num_pairs = digits.len() / 2;
    let mut out = Vec::with_capacity(num_pairs + 2);

    if parsed.negative {
        out.push(!((exponent + 193) as u8));
        for pair in digits.chunks(2) {
            let val = pair[0] * 10 + pair[1];
            out.push(101 - val);
        }
        if out.len() <= 20 {
            out.push(102);
        }
    } else {
        out.push((exponent + 193) as u8);
        for pair in digits.chunks(2) {
            let val = pair[0] * 10 + pair[1];
            out.push(val + 1);
        }
    }

    Ok(out)
}
