//! Validation harness for the environment map distribution.
//!
//! Deterministic and statistical self-checks intended for offline runs:
//! each check returns a pass/fail result with a diagnostic line rather than
//! panicking, so a driver can report the whole battery at once.

use crate::common::*;
use crate::envmap::*;
use crate::geometry::*;
use crate::sampling::*;
use float_cmp::approx_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::fmt;

/// Default sample count for the empirical histogram check.
pub const DISTRIBUTION_SAMPLES: usize = 200_000;

/// Default sample count for the sample/eval consistency check.
pub const CONSISTENCY_SAMPLES: usize = 1000;

/// Default sample count for the concentrated-light check.
pub const CONCENTRATION_SAMPLES: usize = 10_000;

/// Outcome of a single validation check.
#[derive(Clone, Debug)]
pub struct CheckResult {
    /// Name of the check.
    pub name: &'static str,

    /// Whether the check passed.
    pub passed: bool,

    /// Diagnostic detail (worst error, offending index, ...).
    pub detail: String,
}

impl CheckResult {
    /// Returns a passing result.
    ///
    /// * `name`   - Name of the check.
    /// * `detail` - Diagnostic detail.
    fn pass(name: &'static str, detail: String) -> Self {
        Self {
            name,
            passed: true,
            detail,
        }
    }

    /// Returns a failing result.
    ///
    /// * `name`   - Name of the check.
    /// * `detail` - Diagnostic detail.
    fn fail(name: &'static str, detail: String) -> Self {
        Self {
            name,
            passed: false,
            detail,
        }
    }
}

impl fmt::Display for CheckResult {
    /// Formats the result as `[PASS|FAIL] name: detail`.
    ///
    /// * `f` - Formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        write!(f, "[{verdict}] {:<24} {}", self.name, self.detail)
    }
}

/// Returns the index of the first entry smaller than its predecessor.
///
/// * `values` - The sequence to scan.
fn first_decrease(values: &[Float]) -> Option<usize> {
    values.windows(2).position(|w| w[1] < w[0]).map(|i| i + 1)
}

/// Relative error between two values, guarded against both being zero.
///
/// * `a` - First value.
/// * `b` - Second value.
fn relative_error(a: Float, b: Float) -> Float {
    abs(a - b) / max(max(abs(a), abs(b)), Float::MIN_POSITIVE)
}

/// Checks that the marginal CDF and every conditional CDF never decrease.
///
/// * `dist` - The built distribution.
pub fn check_monotonicity(dist: &EnvironmentCdf) -> CheckResult {
    const NAME: &str = "monotonicity";

    if let Some(v) = first_decrease(dist.marginal_cdf()) {
        return CheckResult::fail(NAME, format!("marginal CDF decreases at row {v}"));
    }
    for v in 0..dist.height() {
        if let Some(u) = first_decrease(dist.conditional_row(v)) {
            return CheckResult::fail(NAME, format!("conditional CDF decreases at ({u}, {v})"));
        }
    }
    CheckResult::pass(NAME, format!("{} rows scanned", dist.height()))
}

/// Checks that every CDF ends at 1.0 within tolerance.
///
/// * `dist` - The built distribution.
pub fn check_normalization(dist: &EnvironmentCdf) -> CheckResult {
    const NAME: &str = "normalization";
    const TOLERANCE: Float = 1e-3;

    let last = dist.marginal_cdf()[dist.height() - 1];
    if !approx_eq!(f32, last, 1.0, epsilon = TOLERANCE) {
        return CheckResult::fail(NAME, format!("marginal CDF ends at {last}"));
    }
    for v in 0..dist.height() {
        let last = dist.conditional_row(v)[dist.width() - 1];
        if !approx_eq!(f32, last, 1.0, epsilon = TOLERANCE) {
            return CheckResult::fail(NAME, format!("conditional CDF for row {v} ends at {last}"));
        }
    }
    CheckResult::pass(NAME, format!("all CDFs end within {TOLERANCE} of 1"))
}

/// Builds a 64×32 all-white map and compares the CDFs against their closed
/// forms: the sine row weighting integrates to `(1 - cos θ) / 2` for the
/// marginal, and every conditional CDF is exactly linear.
pub fn check_uniform_environment() -> CheckResult {
    const NAME: &str = "uniform environment";
    let (width, height) = (64_usize, 32_usize);

    let texels: Vec<Float> = std::iter::repeat([1.0, 1.0, 1.0, 1.0])
        .take(width * height)
        .flatten()
        .collect();
    let dist = EnvironmentCdf::from_rgba(&texels, width, height);

    let mut worst_marginal: Float = 0.0;
    for v in 0..height {
        let theta = (v as Float + 1.0) / height as Float * PI;
        let expected = (1.0 - cos(theta)) / 2.0;
        worst_marginal = max(worst_marginal, relative_error(dist.marginal_cdf()[v], expected));
    }
    if worst_marginal >= 0.01 {
        return CheckResult::fail(
            NAME,
            format!("marginal CDF off closed form by {worst_marginal:.4}"),
        );
    }

    let mut worst_conditional: Float = 0.0;
    for v in 0..height {
        let row = dist.conditional_row(v);
        for u in 0..width {
            let expected = (u as Float + 1.0) / width as Float;
            worst_conditional = max(worst_conditional, relative_error(row[u], expected));
        }
    }
    if worst_conditional >= 0.001 {
        return CheckResult::fail(
            NAME,
            format!("conditional CDFs off linear by {worst_conditional:.5}"),
        );
    }

    CheckResult::pass(
        NAME,
        format!("worst relative error {worst_marginal:.2e} marginal, {worst_conditional:.2e} conditional"),
    )
}

/// Draws many samples, bins them per cell, and checks the empirical
/// histogram tracks the weight field (total variation distance between the
/// two discrete distributions).
///
/// * `dist`      - The built distribution.
/// * `weights`   - The weight field `dist` was built from.
/// * `seed`      - RNG seed.
/// * `n_samples` - Number of samples to draw.
pub fn check_distribution(
    dist: &EnvironmentCdf,
    weights: &[Float],
    seed: u64,
    n_samples: usize,
) -> CheckResult {
    const NAME: &str = "sample distribution";

    let (width, height) = (dist.width(), dist.height());
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut counts = vec![0_usize; width * height];
    for _ in 0..n_samples {
        let s = dist.sample(&Point2f::new(rng.gen(), rng.gen()));
        counts[s.v_index * width + s.u_index] += 1;
    }

    let total: f64 = weights.iter().map(|w| *w as f64).sum();
    let tv: f64 = counts
        .iter()
        .zip(weights.iter())
        .map(|(c, w)| {
            let empirical = *c as f64 / n_samples as f64;
            let expected = *w as f64 / total;
            0.5 * (empirical - expected).abs()
        })
        .sum();

    if tv < 0.1 {
        CheckResult::pass(NAME, format!("total variation {tv:.4} over {n_samples} samples"))
    } else {
        CheckResult::fail(NAME, format!("total variation {tv:.4} over {n_samples} samples"))
    }
}

/// Numerically integrates the evaluated PDF over the sphere and checks the
/// result is 1 within quadrature tolerance.
///
/// * `dist` - The built distribution.
pub fn check_pdf_integration(dist: &EnvironmentCdf) -> CheckResult {
    const NAME: &str = "pdf integration";

    let (width, height) = (dist.width(), dist.height());
    let d_theta = PI / height as Float;
    let d_phi = TWO_PI / width as Float;

    let mut integral = 0.0_f64;
    for v in 0..height {
        let vc = (v as Float + 0.5) / height as Float;
        let sin_theta = sin(vc * PI);
        for u in 0..width {
            let uc = (u as Float + 0.5) / width as Float;
            let pdf = dist.pdf(&Point2f::new(uc, vc));
            integral += (pdf * sin_theta * d_theta * d_phi) as f64;
        }
    }

    let error = (integral - 1.0).abs();
    if error < 0.05 {
        CheckResult::pass(NAME, format!("integral {integral:.4}"))
    } else {
        CheckResult::fail(NAME, format!("integral {integral:.4}"))
    }
}

/// Draws samples and checks the evaluator reproduces each sample's density.
///
/// * `dist`      - The built distribution.
/// * `seed`      - RNG seed.
/// * `n_samples` - Number of samples to draw.
pub fn check_sample_eval_consistency(
    dist: &EnvironmentCdf,
    seed: u64,
    n_samples: usize,
) -> CheckResult {
    const NAME: &str = "sample/eval consistency";

    let mut rng = Pcg32::seed_from_u64(seed);
    let mut worst: Float = 0.0;
    for _ in 0..n_samples {
        let s = dist.sample(&Point2f::new(rng.gen(), rng.gen()));
        let eval = dist.pdf(&Point2f::new(s.u, s.v));
        worst = max(worst, relative_error(s.pdf, eval));
    }

    if worst < 0.01 {
        CheckResult::pass(NAME, format!("worst relative error {worst:.2e}"))
    } else {
        CheckResult::fail(NAME, format!("worst relative error {worst:.2e}"))
    }
}

/// Builds a dim map with one extremely bright pixel and checks that most
/// samples land on that pixel's cell.
///
/// * `seed`      - RNG seed.
/// * `n_samples` - Number of samples to draw.
pub fn check_concentration(seed: u64, n_samples: usize) -> CheckResult {
    const NAME: &str = "concentration";

    let (width, height) = (32_usize, 16_usize);
    let (bright_u, bright_v) = (20_usize, 8_usize);

    let mut texels = vec![0.01; width * height * 4];
    let t = 4 * (bright_v * width + bright_u);
    texels[t] = 1000.0;
    texels[t + 1] = 1000.0;
    texels[t + 2] = 1000.0;
    let dist = EnvironmentCdf::from_rgba(&texels, width, height);

    let mut rng = Pcg32::seed_from_u64(seed);
    let mut hits = 0_usize;
    for _ in 0..n_samples {
        let s = dist.sample(&Point2f::new(rng.gen(), rng.gen()));
        if s.u_index == bright_u && s.v_index == bright_v {
            hits += 1;
        }
    }

    let fraction = hits as Float / n_samples as Float;
    if fraction > 0.5 {
        CheckResult::pass(NAME, format!("{fraction:.3} of samples hit the bright cell"))
    } else {
        CheckResult::fail(NAME, format!("{fraction:.3} of samples hit the bright cell"))
    }
}

/// Runs the whole battery against a synthetic reference map and logs each
/// outcome. Deterministic for a given seed.
///
/// * `seed`    - RNG seed for the statistical checks.
/// * `samples` - Sample count for every statistical check; `None` keeps the
///               per-check defaults. Small counts loosen the statistics and
///               may fail the thresholds.
pub fn run_all(seed: u64, samples: Option<usize>) -> Vec<CheckResult> {
    let (width, height) = (32_usize, 16_usize);
    let texels = reference_map(width, height);
    let weights = radiance_weights(&texels, width, height);
    let dist = EnvironmentCdf::new(width, height, &weights);

    let results = vec![
        check_monotonicity(&dist),
        check_normalization(&dist),
        check_uniform_environment(),
        check_distribution(&dist, &weights, seed, samples.unwrap_or(DISTRIBUTION_SAMPLES)),
        check_pdf_integration(&dist),
        check_sample_eval_consistency(
            &dist,
            seed.wrapping_add(1),
            samples.unwrap_or(CONSISTENCY_SAMPLES),
        ),
        check_concentration(seed.wrapping_add(2), samples.unwrap_or(CONCENTRATION_SAMPLES)),
    ];

    for r in results.iter() {
        if r.passed {
            info!("{r}");
        } else {
            warn!("{r}");
        }
    }
    results
}

/// Synthetic HDR-ish reference map: a dim sky gradient with a bright
/// sun patch, so both smooth and concentrated regions are exercised.
///
/// * `width`  - Map width in pixels.
/// * `height` - Map height in pixels.
fn reference_map(width: usize, height: usize) -> Vec<Float> {
    let mut texels = Vec::with_capacity(width * height * 4);
    for v in 0..height {
        let sky = 0.05 + 0.4 * (1.0 - v as Float / height as Float);
        for u in 0..width {
            let sun = u >= width / 4 && u < width / 4 + 2 && v >= height / 4 && v < height / 4 + 2;
            let radiance = if sun { 25.0 } else { sky };
            texels.extend_from_slice(&[radiance, radiance, radiance, 1.0]);
        }
    }
    texels
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
