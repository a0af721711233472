//! Common numeric types and helpers.

use num_traits::Num;
use std::ops::Neg;

/// Use 32-bit precision for floating point numbers.
pub type Float = f32;

/// PI (π)
pub const PI: Float = std::f32::consts::PI;

/// 2*PI (2π)
pub const TWO_PI: Float = PI * 2.0;

/// 1/2*PI (1/2π)
pub const INV_TWO_PI: Float = 1.0 / TWO_PI;

/// 4*PI (4π)
pub const FOUR_PI: Float = PI * 4.0;

/// 1/4*PI (1/4π)
pub const INV_FOUR_PI: Float = 1.0 / FOUR_PI;

/// Largest representable value below 1.0.
pub const ONE_MINUS_EPSILON: Float = 1.0 - Float::EPSILON * 0.5;

/// Returns the absolute value of a number.
///
/// * `n` - The number.
#[inline(always)]
pub fn abs<T>(n: T) -> T
where
    T: Num + Neg<Output = T> + PartialOrd + Copy,
{
    if n < T::zero() {
        -n
    } else {
        n
    }
}

/// Returns the minimum of 2 numbers.
///
/// * `a` - First number.
/// * `b` - Second number.
#[inline(always)]
pub fn min<T>(a: T, b: T) -> T
where
    T: Num + PartialOrd + Copy,
{
    if a < b {
        a
    } else {
        b
    }
}

/// Returns the maximum of 2 numbers.
///
/// * `a` - First number.
/// * `b` - Second number.
#[inline(always)]
pub fn max<T>(a: T, b: T) -> T
where
    T: Num + PartialOrd + Copy,
{
    if a > b {
        a
    } else {
        b
    }
}

/// Clamps a value to the interval `[low, high]`.
///
/// * `val`  - The value.
/// * `low`  - Lower bound.
/// * `high` - Upper bound.
#[inline(always)]
pub fn clamp<T>(val: T, low: T, high: T) -> T
where
    T: Num + PartialOrd + Copy,
{
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}

/// Return the sine of an angle.
///
/// * `theta` - The angle in radians.
#[inline(always)]
pub fn sin(theta: Float) -> Float {
    theta.sin()
}

/// Return the cosine of an angle.
///
/// * `theta` - The angle in radians.
#[inline(always)]
pub fn cos(theta: Float) -> Float {
    theta.cos()
}

/// Bisects `[0, size)` and returns the smallest index for which `pred`
/// returns `false`, clamped to `size - 1`. With `pred(i) = cdf[i] < x` over
/// a non-decreasing `cdf` this is the inverse-CDF lookup: the first entry
/// that reaches `x`, or the last entry when none does.
///
/// * `size` - Size of the array being bisected.
/// * `pred` - Predicate evaluated at a given index; must be monotone
///            (true for a prefix of the indices, false afterwards).
pub fn find_index<Predicate>(size: usize, pred: Predicate) -> usize
where
    Predicate: Fn(usize) -> bool,
{
    let (mut first, mut len) = (0, size);

    while len > 0 {
        let half = len >> 1;
        let middle = first + half;

        // Bisect range based on value of `pred` at `middle`.
        if pred(middle) {
            first = middle + 1;
            len -= half + 1;
        } else {
            len = half;
        }
    }

    min(first, size - 1)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_index_returns_first_entry_reaching_the_bound() {
        let cdf = [0.1, 0.4, 0.4, 0.9, 1.0];
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.0), 0);
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.1), 0);
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.2), 1);
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.4), 1);
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.5), 3);
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 1.0), 4);
    }

    #[test]
    fn find_index_clamps_to_last_entry_when_no_entry_reaches_the_bound() {
        let cdf = [0.25, 0.5, 0.75, 1.0];
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 2.0), 3);
    }

    #[test]
    fn find_index_on_single_entry_returns_zero() {
        let cdf = [1.0];
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.0), 0);
        assert_eq!(find_index(cdf.len(), |i| cdf[i] < 0.99), 0);
    }

    #[test]
    fn clamp_limits_values_to_the_interval() {
        assert_eq!(clamp(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.5, 0.0, 1.0), 0.5);
        assert_eq!(clamp(2.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(7_usize, 0, 3), 3);
    }

    #[test]
    fn reciprocal_constants_invert_their_angles() {
        assert!((INV_TWO_PI * TWO_PI - 1.0).abs() < 1e-6);
        assert!((INV_FOUR_PI * FOUR_PI - 1.0).abs() < 1e-6);
    }

    #[test]
    fn one_minus_epsilon_is_below_one() {
        assert!(ONE_MINUS_EPSILON < 1.0);
        assert_eq!(ONE_MINUS_EPSILON.to_bits() + 1, 1.0_f32.to_bits());
    }
}
