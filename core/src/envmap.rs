//! Environment map weight field.

use crate::common::*;

/// Returns the Rec. 709 luminance of a linear RGB triple.
///
/// * `r` - Red component.
/// * `g` - Green component.
/// * `b` - Blue component.
#[inline(always)]
pub fn luminance(r: Float, g: Float, b: Float) -> Float {
    0.212671 * r + 0.715160 * g + 0.072169 * b
}

/// Converts an equirectangular RGBA radiance map into one importance weight
/// per pixel: luminance scaled by the sine of the row's polar angle, since
/// rows near the poles subtend less solid angle than rows near the equator.
///
/// The buffer is row-major with 4 floats per texel; alpha is ignored.
/// Finite non-negative radiance gives well-defined weights; NaN/Inf texels
/// propagate into the result (sanitizing them is the image loader's job).
///
/// * `texels` - RGBA texels, `width * height * 4` floats.
/// * `width`  - Map width in pixels.
/// * `height` - Map height in pixels.
pub fn radiance_weights(texels: &[Float], width: usize, height: usize) -> Vec<Float> {
    debug_assert_eq!(texels.len(), width * height * 4);

    let mut weights = Vec::with_capacity(width * height);
    for v in 0..height {
        // Pixel-center convention: row `v` maps to theta = (v + 0.5) / height * PI.
        let sin_theta = sin(PI * (v as Float + 0.5) / height as Float);
        for u in 0..width {
            let t = 4 * (v * width + u);
            weights.push(luminance(texels[t], texels[t + 1], texels[t + 2]) * sin_theta);
        }
    }
    weights
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
