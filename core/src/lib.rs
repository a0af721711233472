//! Importance sampling for equirectangular HDR environment maps.
//!
//! Builds a two-level (marginal + conditional) piecewise-constant
//! distribution over a radiance map so a path tracer can draw light
//! directions proportional to the map's luminance, and evaluates the
//! matching solid-angle PDF for multiple importance sampling.

#[macro_use]
extern crate log;

// Re-export.
pub mod common;
pub mod envmap;
pub mod geometry;
pub mod sampling;
pub mod validate;
