//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Widen a `u32` count to `f64`.
#[must_use]
pub fn count_to_f64(value: u32) -> f64 {
    f64::from(value)
}

/// Convert a `usize` to `f64` while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Replace NaN and infinities with zero; JSON cannot hold them.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Clamp a f64 into `[min, max]`, collapsing non-finite input to `min`.
#[must_use]
pub fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}
