use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Every timer,
/// progress value and speed in the simulation uses it.
pub type Fixed64 = I32F32;

/// Completed simulation steps.
pub type Ticks = u64;

/// Seconds in a minute, for items-per-minute conversions.
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
/// Returns `None` for NaN, infinities and values outside the Q32.32 range.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Cells (or items) per second for an items-per-minute rating. Ratings past
/// `Fixed64::MAX` saturate.
#[inline]
pub fn per_minute_to_per_second(items_per_minute: u32) -> Fixed64 {
    Fixed64::saturating_from_num(items_per_minute) / Fixed64::from_num(SECONDS_PER_MINUTE)
}

/// `quantity * 60 / seconds`, the per-minute rate of something that happens
/// once every `seconds`. Returns `None` for a non-positive period or a rate
/// that does not fit.
#[inline]
pub fn per_minute(quantity: u32, seconds: Fixed64) -> Option<Fixed64> {
    if seconds <= Fixed64::ZERO {
        return None;
    }
    Fixed64::checked_from_num(quantity)?
        .checked_mul(Fixed64::from_num(SECONDS_PER_MINUTE))?
        .checked_div(seconds)
}
