//! ECMAScript `Number.prototype.toString` formatting (RFC 8785 §3.2.2.3).
//!
//! JCS treats every JSON number as an IEEE-754 double, so integers beyond
//! 2^53 collapse the same way they would in a JavaScript runtime.

use serde_json::Number;

use crate::error::CanonicalError;

/// Format a JSON number the way JCS requires.
pub fn format_number(number: &Number) -> Result<String, CanonicalError> {
    let value = number
        .as_f64()
        .ok_or_else(|| CanonicalError::NonFiniteNumber(number.to_string()))?;
    format_f64(value)
}

/// Format a double the way JCS requires.
pub fn format_f64(value: f64) -> Result<String, CanonicalError> {
    if !value.is_finite() {
        return Err(CanonicalError::NonFiniteNumber(value.to_string()));
    }
    // Covers -0 as well.
    if value == 0.0 {
        return Ok("0".to_string());
    }
    if value.is_sign_negative() {
        return Ok(format!("-{}", format_positive(-value)));
    }
    Ok(format_positive(value))
}

fn format_positive(value: f64) -> String {
    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e-7".
    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let k = digits.len() as i32;
    let n = exponent + 1;

    if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{int_part}.{frac_part}")
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e < 0 { '-' } else { '+' };
        let (head, tail) = digits.split_at(1);
        if tail.is_empty() {
            format!("{head}e{sign}{}", e.abs())
        } else {
            format!("{head}.{tail}e{sign}{}", e.abs())
        }
    }
}
