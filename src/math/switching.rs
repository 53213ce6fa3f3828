//! A smooth 0 -> 1 switching profile.
//!
//! All weighting criteria switch through this C1-continuous cubic, so the
//! weight function has no jumps.

/// Switches from 0 (for `x <= -1`) to 1 (for `x >= 1`).
///
/// Between the two plateaus the profile is the cubic `s^2 (3 - 2 s)` with
/// `s = (x + 1) / 2`, whose first derivative vanishes at both ends. The value
/// at `x = 0` is exactly one half.
#[inline]
pub fn switch(x: f64) -> f64 {
    if x <= -1.0 {
        0.0
    } else if x >= 1.0 {
        1.0
    } else {
        let s = 0.5 * (x + 1.0);
        s * s * (3.0 - 2.0 * s)
    }
}

/// The complement of [`switch`], switching from 1 down to 0.
#[inline]
pub fn switch_off(x: f64) -> f64 {
    1.0 - switch(x)
}
