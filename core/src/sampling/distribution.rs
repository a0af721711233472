//! Two-level piecewise-constant distribution over an equirectangular map.

use crate::common::*;
use crate::envmap::radiance_weights;
use crate::geometry::*;

/// Lower clamp for sin(theta) so densities stay finite at the poles.
const SIN_THETA_MIN: Float = 1e-4;

/// A sampled environment map coordinate and its density.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnvSample {
    /// Horizontal map coordinate in `[0, 1)`.
    pub u: Float,

    /// Vertical map coordinate in `[0, 1)`.
    pub v: Float,

    /// Probability density with respect to solid angle. Always > 0.
    pub pdf: Float,

    /// Column index of the sampled cell.
    pub u_index: usize,

    /// Row index of the sampled cell.
    pub v_index: usize,
}

/// Sampling distribution for an equirectangular environment map: a marginal
/// CDF over rows (polar angle) and one conditional CDF per row over columns
/// (azimuthal angle), factoring the 2-D density into two 1-D bisections.
///
/// Immutable once built; sampling and evaluation take `&self` only, so one
/// instance can be shared across renderer worker threads without locking.
#[derive(Clone, Debug)]
pub struct EnvironmentCdf {
    /// Map width in pixels.
    width: usize,

    /// Map height in pixels.
    height: usize,

    /// Marginal CDF over rows; `height` entries, non-decreasing, last ≈ 1.
    marginal_cdf: Vec<Float>,

    /// Conditional CDFs over columns, one row after another in a flat
    /// row-major buffer of `width * height` entries; each row is
    /// non-decreasing with last entry ≈ 1.
    conditional_cdfs: Vec<Float>,
}

impl EnvironmentCdf {
    /// Builds the distribution from a per-pixel weight field.
    ///
    /// Rows whose weights sum to zero fall back to a uniform CDF over their
    /// columns; an entirely zero field falls back to a uniform CDF over rows
    /// as well. The result is always monotone and normalized for any
    /// non-negative finite input.
    ///
    /// * `width`   - Map width in pixels.
    /// * `height`  - Map height in pixels.
    /// * `weights` - Row-major weight field, `width * height` entries.
    pub fn new(width: usize, height: usize, weights: &[Float]) -> Self {
        debug_assert_eq!(weights.len(), width * height);

        let mut conditional_cdfs = vec![0.0; width * height];
        let mut row_sums = vec![0.0_f64; height];
        let mut zero_rows = 0;

        for v in 0..height {
            let row = &mut conditional_cdfs[v * width..(v + 1) * width];

            // Running sum across the columns; accumulate in f64 so wide maps
            // do not lose the small weights, then narrow back to Float.
            let mut sum = 0.0_f64;
            for (u, c) in row.iter_mut().enumerate() {
                sum += weights[v * width + u] as f64;
                *c = sum as Float;
            }
            row_sums[v] = sum;

            if sum > 0.0 {
                // Rounding in `* inv` can overshoot 1.0 by a ulp; clamp so the
                // row stays non-decreasing once the last entry is pinned.
                let inv = 1.0 / sum as Float;
                for c in row.iter_mut() {
                    *c = min(*c * inv, 1.0);
                }
                row[width - 1] = 1.0;
            } else {
                zero_rows += 1;
                for (u, c) in row.iter_mut().enumerate() {
                    *c = (u as Float + 1.0) / width as Float;
                }
            }
        }

        let mut marginal_cdf = vec![0.0; height];
        let mut total = 0.0_f64;
        for v in 0..height {
            total += row_sums[v];
            marginal_cdf[v] = total as Float;
        }

        if total > 0.0 {
            let inv = 1.0 / total as Float;
            for m in marginal_cdf.iter_mut() {
                *m = min(*m * inv, 1.0);
            }
            marginal_cdf[height - 1] = 1.0;
        } else if height > 0 {
            warn!("environment map has zero total weight; sampling rows uniformly");
            for (v, m) in marginal_cdf.iter_mut().enumerate() {
                *m = (v as Float + 1.0) / height as Float;
            }
        }

        if zero_rows > 0 {
            debug!("{zero_rows} of {height} environment map rows have zero weight");
        }

        Self {
            width,
            height,
            marginal_cdf,
            conditional_cdfs,
        }
    }

    /// Builds the distribution straight from an RGBA radiance map, weighting
    /// each texel by its luminance and the sine of its row's polar angle.
    ///
    /// * `texels` - RGBA texels, row-major, `width * height * 4` floats.
    /// * `width`  - Map width in pixels.
    /// * `height` - Map height in pixels.
    pub fn from_rgba(texels: &[Float], width: usize, height: usize) -> Self {
        let weights = radiance_weights(texels, width, height);
        Self::new(width, height, &weights)
    }

    /// Returns the map width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the map height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the marginal CDF over rows.
    pub fn marginal_cdf(&self) -> &[Float] {
        &self.marginal_cdf
    }

    /// Returns row `v`'s conditional CDF over columns.
    ///
    /// * `v` - Row index.
    pub fn conditional_row(&self, v: usize) -> &[Float] {
        &self.conditional_cdfs[v * self.width..(v + 1) * self.width]
    }

    /// Draws a map coordinate proportional to the weight field by inverse
    /// transform sampling: one bisection over the marginal CDF picks the row,
    /// a second over that row's conditional CDF picks the column. Returns the
    /// cell's center coordinates and its solid-angle density.
    ///
    /// Random values outside `[0, 1)` are tolerated; the bisection clamps
    /// them to the first or last cell.
    ///
    /// * `u2` - Two independent uniform random values in `[0, 1)`.
    pub fn sample(&self, u2: &Point2f) -> EnvSample {
        if self.is_degenerate() {
            // Malformed map; fall back to a uniform sphere density.
            return EnvSample {
                u: 0.5,
                v: 0.5,
                pdf: INV_FOUR_PI,
                u_index: 0,
                v_index: 0,
            };
        }

        let v_index = find_index(self.height, |i| self.marginal_cdf[i] < u2.y);
        let row = self.conditional_row(v_index);
        let u_index = find_index(self.width, |i| row[i] < u2.x);

        EnvSample {
            u: (u_index as Float + 0.5) / self.width as Float,
            v: (v_index as Float + 0.5) / self.height as Float,
            pdf: self.cell_pdf(u_index, v_index),
            u_index,
            v_index,
        }
    }

    /// Returns the solid-angle density `sample()` would report for a sample
    /// landing at `uv`. Re-derives the cell by quantization instead of
    /// bisection and applies the same conversion as `sample()`, as required
    /// for multiple importance sampling weights.
    ///
    /// Coordinates are clamped to `[0, 1 - epsilon]` before quantization, so
    /// the `u = 1` / `v = 1` boundary stays in range.
    ///
    /// * `uv` - Map coordinate.
    pub fn pdf(&self, uv: &Point2f) -> Float {
        if self.is_degenerate() {
            return INV_FOUR_PI;
        }

        let u = clamp(uv.x, 0.0, ONE_MINUS_EPSILON);
        let v = clamp(uv.y, 0.0, ONE_MINUS_EPSILON);
        let u_index = min((u * self.width as Float) as usize, self.width - 1);
        let v_index = min((v * self.height as Float) as usize, self.height - 1);
        self.cell_pdf(u_index, v_index)
    }

    /// Returns true when the distribution cannot cover the sphere.
    fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Solid-angle density of cell `(u_index, v_index)`: the discrete
    /// conditional × marginal probability mass converted first to a per-area
    /// density in UV space (`× width × height`) and then to solid angle for
    /// the equirectangular parameterization (`÷ 2π² sinθ`, from
    /// `dΩ = sinθ dθ dφ` with θ ∈ [0, π], φ ∈ [0, 2π]).
    ///
    /// * `u_index` - Column index.
    /// * `v_index` - Row index.
    fn cell_pdf(&self, u_index: usize, v_index: usize) -> Float {
        let marginal_pdf = if v_index > 0 {
            self.marginal_cdf[v_index] - self.marginal_cdf[v_index - 1]
        } else {
            self.marginal_cdf[0]
        };

        let row = self.conditional_row(v_index);
        let conditional_pdf = if u_index > 0 {
            row[u_index] - row[u_index - 1]
        } else {
            row[0]
        };

        let v = (v_index as Float + 0.5) / self.height as Float;
        let sin_theta = max(sin(v * PI), SIN_THETA_MIN);

        let pdf = conditional_pdf * marginal_pdf * (self.width * self.height) as Float
            / (TWO_PI * PI * sin_theta);

        // A random value sitting exactly on a CDF plateau edge can select a
        // zero-mass cell; keep the density strictly positive so Monte Carlo
        // weighting downstream never divides by zero.
        max(pdf, Float::MIN_POSITIVE)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::*;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    /// Golden 2×2 scenario: weights `[[10, 1], [1, 1]]`.
    #[test]
    fn bright_top_left_cell_dominates_its_row_and_the_marginal() {
        let dist = EnvironmentCdf::new(2, 2, &[10.0, 1.0, 1.0, 1.0]);

        assert_approx_eq!(f32, dist.conditional_row(0)[0], 10.0 / 11.0, epsilon = 1e-6);
        assert_approx_eq!(f32, dist.conditional_row(0)[1], 1.0);
        assert_approx_eq!(f32, dist.conditional_row(1)[0], 0.5, epsilon = 1e-6);
        assert_approx_eq!(f32, dist.conditional_row(1)[1], 1.0);
        // Row sums are 11 and 2, so the marginal mass of row 0 is 11/13.
        assert_approx_eq!(f32, dist.marginal_cdf()[0], 11.0 / 13.0, epsilon = 1e-6);
        assert_approx_eq!(f32, dist.marginal_cdf()[1], 1.0);
    }

    #[test]
    fn construction_is_deterministic() {
        let weights: Vec<Float> = (0..12 * 6).map(|i| (i % 7) as Float).collect();
        let a = EnvironmentCdf::new(12, 6, &weights);
        let b = EnvironmentCdf::new(12, 6, &weights);
        assert_eq!(a.marginal_cdf(), b.marginal_cdf());
        for v in 0..6 {
            assert_eq!(a.conditional_row(v), b.conditional_row(v));
        }
    }

    #[test]
    fn zero_weight_row_falls_back_to_uniform_columns() {
        let dist = EnvironmentCdf::new(4, 2, &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        let row = dist.conditional_row(0);
        for u in 0..4 {
            assert_approx_eq!(f32, row[u], (u as Float + 1.0) / 4.0);
        }
        // The second row is untouched by the fallback.
        assert_approx_eq!(f32, dist.conditional_row(1)[0], 0.1, epsilon = 1e-6);
        assert_approx_eq!(f32, dist.marginal_cdf()[0], 0.0);
    }

    #[test]
    fn zero_weight_map_falls_back_to_uniform_rows_and_columns() {
        let dist = EnvironmentCdf::new(3, 4, &[0.0; 12]);
        for v in 0..4 {
            assert_approx_eq!(f32, dist.marginal_cdf()[v], (v as Float + 1.0) / 4.0);
            let row = dist.conditional_row(v);
            for u in 0..3 {
                assert_approx_eq!(f32, row[u], (u as Float + 1.0) / 3.0);
            }
        }
    }

    #[test]
    fn sample_returns_cell_centers_inside_unit_square() {
        let weights: Vec<Float> = (0..8 * 4).map(|i| 1.0 + (i % 3) as Float).collect();
        let dist = EnvironmentCdf::new(8, 4, &weights);
        let mut rng = Pcg32::seed_from_u64(7);

        for _ in 0..200 {
            let s = dist.sample(&Point2f::new(rng.gen(), rng.gen()));
            assert!(s.u >= 0.0 && s.u < 1.0);
            assert!(s.v >= 0.0 && s.v < 1.0);
            assert!(s.pdf > 0.0);
            assert_approx_eq!(f32, s.u, (s.u_index as Float + 0.5) / 8.0);
            assert_approx_eq!(f32, s.v, (s.v_index as Float + 0.5) / 4.0);
        }
    }

    #[test]
    fn sample_and_pdf_agree_on_the_sampled_cell() {
        let weights: Vec<Float> = (0..16 * 8).map(|i| ((i * 13) % 11) as Float + 0.5).collect();
        let dist = EnvironmentCdf::new(16, 8, &weights);
        let mut rng = Pcg32::seed_from_u64(11);

        for _ in 0..500 {
            let s = dist.sample(&Point2f::new(rng.gen(), rng.gen()));
            let eval = dist.pdf(&Point2f::new(s.u, s.v));
            assert_approx_eq!(f32, s.pdf, eval, epsilon = 1e-6, ulps = 4);
        }
    }

    #[test]
    fn boundary_random_values_select_first_and_last_cells() {
        let dist = EnvironmentCdf::new(4, 4, &[1.0; 16]);

        let lo = dist.sample(&Point2f::new(0.0, 0.0));
        assert_eq!((lo.u_index, lo.v_index), (0, 0));

        let hi = dist.sample(&Point2f::new(ONE_MINUS_EPSILON, ONE_MINUS_EPSILON));
        assert_eq!((hi.u_index, hi.v_index), (3, 3));
    }

    #[test]
    fn out_of_range_inputs_are_clamped_not_rejected() {
        let dist = EnvironmentCdf::new(4, 4, &[1.0; 16]);

        let below = dist.sample(&Point2f::new(-0.5, -2.0));
        assert_eq!((below.u_index, below.v_index), (0, 0));
        let above = dist.sample(&Point2f::new(1.5, 2.0));
        assert_eq!((above.u_index, above.v_index), (3, 3));

        assert!(dist.pdf(&Point2f::new(1.0, 1.0)) > 0.0);
        assert!(dist.pdf(&Point2f::new(-0.25, 0.5)) > 0.0);
    }

    #[test]
    fn degenerate_dimensions_fall_back_to_uniform_sphere_density() {
        let dist = EnvironmentCdf::new(0, 0, &[]);
        let s = dist.sample(&Point2f::new(0.3, 0.8));
        assert_eq!((s.u, s.v), (0.5, 0.5));
        assert_approx_eq!(f32, s.pdf, INV_FOUR_PI);
        assert_approx_eq!(f32, dist.pdf(&Point2f::new(0.1, 0.9)), INV_FOUR_PI);
    }

    #[test]
    fn from_rgba_matches_explicit_weight_field_construction() {
        let mut texels = Vec::new();
        for i in 0..6 * 3 {
            let x = (i % 5) as Float * 0.2;
            texels.extend_from_slice(&[x, 0.5 * x, 2.0 * x, 1.0]);
        }
        let via_image = EnvironmentCdf::from_rgba(&texels, 6, 3);
        let weights = crate::envmap::radiance_weights(&texels, 6, 3);
        let via_weights = EnvironmentCdf::new(6, 3, &weights);

        assert_eq!(via_image.marginal_cdf(), via_weights.marginal_cdf());
        for v in 0..3 {
            assert_eq!(via_image.conditional_row(v), via_weights.conditional_row(v));
        }
    }

    proptest! {
        #[test]
        fn built_cdfs_are_monotone_and_normalized(
            (width, height, weights) in (1_usize..12, 1_usize..12).prop_flat_map(|(w, h)| {
                (
                    Just(w),
                    Just(h),
                    prop::collection::vec(0.0_f32..100.0, w * h),
                )
            })
        ) {
            let dist = EnvironmentCdf::new(width, height, &weights);

            let marginal = dist.marginal_cdf();
            prop_assert!(marginal.windows(2).all(|w| w[1] >= w[0]));
            prop_assert!((marginal[height - 1] - 1.0).abs() < 1e-3);

            for v in 0..height {
                let row = dist.conditional_row(v);
                prop_assert!(row.windows(2).all(|w| w[1] >= w[0]));
                prop_assert!((row[width - 1] - 1.0).abs() < 1e-3);
            }
        }
    }
}
