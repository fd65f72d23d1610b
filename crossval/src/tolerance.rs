//! Quantization-aware comparison tolerance
//!
//! `atol = quant_step_factor * quant_size + base_atol(precision)` and
//! `rtol = base_rtol(precision)`. The quantization term allows the two sides
//! to land on neighbouring grid points of the output scale; the zero point
//! shifts the grid but not its spacing, so it is not an input.

use crate::driver::RunFlags;
use qconv_common::Precision;
use serde::{Deserialize, Serialize};

/// Quantization steps allowed when the config does not say otherwise.
pub const DEFAULT_QUANT_STEP_FACTOR: f32 = 1.0;

/// Elementwise bound `|a - b| <= atol + rtol * |b|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub atol: f32,
    pub rtol: f32,
}

impl Tolerance {
    pub fn base_atol(precision: Precision) -> f32 {
        match precision {
            Precision::FP32 => 1e-4,
            Precision::FP16 => 5e-2,
        }
    }

    pub fn base_rtol(precision: Precision) -> f32 {
        match precision {
            Precision::FP32 => 1e-4,
            Precision::FP16 => 5e-2,
        }
    }

    /// Tolerance of a run with the default step factor.
    pub fn for_run(flags: &RunFlags, precision: Precision) -> Self {
        Self::with_step_factor(flags, precision, DEFAULT_QUANT_STEP_FACTOR)
    }

    pub fn with_step_factor(flags: &RunFlags, precision: Precision, quant_step_factor: f32) -> Self {
        let quant_term =
            if flags.quantized_ops { quant_step_factor * flags.quant_size.abs() } else { 0.0 };
        Self {
            atol: quant_term + Self::base_atol(precision),
            rtol: Self::base_rtol(precision),
        }
    }

    #[inline]
    pub fn allows(&self, actual: f32, expected: f32) -> bool {
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_widens_atol() {
        let t = Tolerance::for_run(&RunFlags::quantized(1.3), Precision::FP32);
        assert!((t.atol - (1.3 + 1e-4)).abs() < 1e-6);
        assert_eq!(t.rtol, 1e-4);
    }

    #[test]
    fn non_quantized_runs_use_base_only() {
        let flags = RunFlags { quantized_ops: false, ..RunFlags::quantized(1.3) };
        assert_eq!(Tolerance::for_run(&flags, Precision::FP16).atol, 5e-2);
    }

    #[test]
    fn allows_one_step() {
        let t = Tolerance::for_run(&RunFlags::quantized(0.3), Precision::FP32);
        assert!(t.allows(0.6, 0.3));
        assert!(!t.allows(0.9, 0.3));
    }
}
