//! Inverse-CDF sampling of environment maps.

mod distribution;

// Re-export
pub use distribution::*;
