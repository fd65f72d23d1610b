//! Scalar affine mapping helpers

use crate::{QuantDType, QuantParams};

/// Quantize a single real value: `clamp(round_ties_even(x / scale) + zp)`.
#[inline]
pub fn quantize_value(x: f32, params: QuantParams, dtype: QuantDType) -> i32 {
    let q = (x / params.scale()).round_ties_even() as i64 + params.zero_point() as i64;
    q.clamp(dtype.qmin() as i64, dtype.qmax() as i64) as i32
}

/// Dequantize a single integer value: `(q - zp) * scale`.
#[inline]
pub fn dequantize_value(q: i32, params: QuantParams) -> f32 {
    (q as i64 - params.zero_point() as i64) as f32 * params.scale()
}

/// Map a real-valued accumulator into the output domain.
///
/// This is the requantization step of a quantized kernel: the accumulator has
/// already been scaled back to reals (`acc * s_in * s_w + bias`).
#[inline]
pub fn requantize(real: f32, output: QuantParams, dtype: QuantDType) -> i32 {
    quantize_value(real, output, dtype)
}
