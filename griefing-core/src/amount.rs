//! Fixed-point conversion between display amounts and token base units.
//!
//! Amounts cross the public API as base-10 decimal strings in display units
//! ("1.5"). The ledger works in base units: integers scaled by 10^18. The
//! conversion is exact for up to [`DECIMALS`] fractional digits and refuses
//! anything finer rather than rounding.

use crate::error::{GriefingError, GriefingResult};

/// Fractional digits of the token.
pub const DECIMALS: usize = 18;

/// 10^DECIMALS.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Parse a decimal string into base units.
///
/// Accepts `"5"`, `"0.25"`, `".5"` and `"5."`. Signs, exponents, separators
/// and whitespace are rejected.
pub fn to_base_units(amount: &str) -> GriefingResult<u128> {
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(GriefingError::InvalidAmount(format!(
            "'{}' is not a decimal number",
            amount
        )));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(GriefingError::InvalidAmount(format!(
            "'{}' is not a non-negative decimal number",
            amount
        )));
    }
    if frac_part.len() > DECIMALS {
        return Err(GriefingError::Precision {
            amount: amount.to_string(),
            digits: frac_part.len(),
        });
    }

    let overflow = || GriefingError::InvalidAmount(format!("'{}' exceeds the base-unit range", amount));

    let whole = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<u128>().map_err(|_| overflow())?
    };
    let fraction = if frac_part.is_empty() {
        0
    } else {
        let scale = 10u128.pow((DECIMALS - frac_part.len()) as u32);
        // at most 18 digits, fits
        frac_part.parse::<u128>().map_err(|_| overflow())? * scale
    };

    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(overflow)
}

/// Like [`to_base_units`], but rejects amounts that are zero.
pub fn to_positive_base_units(amount: &str) -> GriefingResult<u128> {
    let units = to_base_units(amount)?;
    if units == 0 {
        return Err(GriefingError::InvalidAmount(format!(
            "'{}' must be greater than zero",
            amount
        )));
    }
    Ok(units)
}

/// Render base units as a canonical decimal string.
///
/// Canonical means no trailing fractional zeros and no trailing dot:
/// `3 * UNIT` renders as `"3"`, `UNIT / 2` as `"0.5"`.
pub fn from_base_units(units: u128) -> String {
    let whole = units / UNIT;
    let fraction = units % UNIT;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", fraction, width = DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Normalise a decimal string to its canonical form ("05.10" -> "5.1").
pub fn canonicalize(amount: &str) -> GriefingResult<String> {
    to_base_units(amount).map(from_base_units)
}
