//! Numeric helpers centralizing finite guards and safe casts for currency math.

use num_traits::cast::cast;

/// Coerce a non-finite value to `0.0`, warning under the given context.
#[must_use]
pub fn finite_or_zero(value: f64, context: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        log::warn!("invalid numeric input {value} for {context}; coerced to 0");
        0.0
    }
}

/// Floor a currency amount to a whole unit, returning 0.0 for non-finite input.
#[must_use]
pub fn floor_currency(value: f64) -> f64 {
    if value.is_finite() { value.floor() } else { 0.0 }
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert u32 counts to f64.
#[must_use]
pub fn u32_to_f64(value: u32) -> f64 {
    f64::from(value)
}

/// Clamp a probability into `[0, 1]`, mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
