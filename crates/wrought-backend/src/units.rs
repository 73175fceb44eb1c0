//! Decimal token amounts → 18-decimal base-unit integer strings.

use crate::BackendError;

/// Decimal places of the base unit.
pub const BASE_UNIT_DECIMALS: usize = 18;

/// Convert a decimal token amount (e.g. `"1.5"`) to its base-unit integer
/// representation (`"1500000000000000000"`).
///
/// Pure digit shifting over the string form: amounts routinely exceed u64
/// range, and no rounding is acceptable, so the fractional part is capped at
/// 18 digits rather than truncated.
pub fn to_base_units(amount: &str) -> Result<String, BackendError> {
    let trimmed = amount.trim();
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    let all_digits =
        |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let valid = match (int_part.is_empty(), frac_part.is_empty()) {
        (false, false) => all_digits(int_part) && all_digits(frac_part),
        (false, true) => all_digits(int_part) && !trimmed.contains('.'),
        (true, false) => all_digits(frac_part),
        (true, true) => false,
    };
    if !valid || frac_part.len() > BASE_UNIT_DECIMALS {
        return Err(BackendError::InvalidAmount(amount.to_owned()));
    }

    let mut digits = String::with_capacity(int_part.len() + BASE_UNIT_DECIMALS);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    for _ in frac_part.len()..BASE_UNIT_DECIMALS {
        digits.push('0');
    }

    let significant = digits.trim_start_matches('0');
    Ok(if significant.is_empty() {
        "0".to_owned()
    } else {
        significant.to_owned()
    })
}
