//! Utility functions for comparing real-valued and quantized data

use qconv_common::{QuantizationError, Result};

/// Largest rounding error a single quantize / dequantize pass can introduce.
pub fn half_step(scale: f32) -> f32 {
    scale * 0.5
}

/// Calculate mean squared error between two slices
pub fn calculate_mse(a: &[f32], b: &[f32]) -> Result<f32> {
    validate_lengths(a, b)?;
    if a.is_empty() {
        return Ok(0.0);
    }
    let mse = a.iter().zip(b).map(|(&x, &y)| (x - y).powi(2)).sum::<f32>() / a.len() as f32;
    Ok(mse)
}

/// Maximum absolute elementwise difference
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> Result<f32> {
    validate_lengths(a, b)?;
    Ok(a.iter().zip(b).map(|(&x, &y)| (x - y).abs()).fold(0.0f32, f32::max))
}

fn validate_lengths(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(QuantizationError::QuantizationFailed {
            reason: format!("length mismatch: {} vs {}", a.len(), b.len()),
        }
        .into());
    }
    Ok(())
}
