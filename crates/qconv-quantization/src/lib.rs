//! Per-tensor affine quantization
//!
//! This crate provides the quantize / dequantize primitives the quantized
//! convolution modules are built on:
//! - `quint8`: unsigned 8-bit activations, range `[0, 255]`
//! - `qint8`: signed 8-bit weights, range `[-128, 127]`
//!
//! A real value `x` maps to `q = clamp(round_ties_even(x / scale) + zero_point)`
//! and back to `(q - zero_point) * scale`.

use qconv_common::{HostTensor, QuantizationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod affine;
pub mod utils;

pub use affine::{dequantize_value, quantize_value, requantize};

/// Integer storage type of a quantized tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantDType {
    QUInt8,
    QInt8,
}

impl QuantDType {
    pub fn qmin(self) -> i32 {
        match self {
            Self::QUInt8 => 0,
            Self::QInt8 => i8::MIN as i32,
        }
    }

    pub fn qmax(self) -> i32 {
        match self {
            Self::QUInt8 => u8::MAX as i32,
            Self::QInt8 => i8::MAX as i32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::QUInt8 => "quint8",
            Self::QInt8 => "qint8",
        }
    }

    pub fn contains(self, q: i32) -> bool {
        (self.qmin()..=self.qmax()).contains(&q)
    }
}

impl fmt::Display for QuantDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scale and zero point of a per-tensor affine mapping.
///
/// `scale` is strictly positive and finite. The zero point is the integer that
/// represents real `0.0`; it is range-checked against a dtype only when the
/// params are attached to a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    scale: f32,
    zero_point: i32,
}

impl QuantParams {
    pub fn new(scale: f32, zero_point: i32) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(QuantizationError::InvalidParams {
                reason: format!("scale must be positive and finite, got {scale}"),
            }
            .into());
        }
        Ok(Self { scale, zero_point })
    }

    /// Identity mapping (`scale = 1.0`, `zero_point = 0`).
    pub fn unit() -> Self {
        Self { scale: 1.0, zero_point: 0 }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zero_point(&self) -> i32 {
        self.zero_point
    }

    fn check_dtype(&self, dtype: QuantDType) -> Result<()> {
        if !dtype.contains(self.zero_point) {
            return Err(QuantizationError::InvalidParams {
                reason: format!(
                    "zero_point {} outside {} range [{}, {}]",
                    self.zero_point,
                    dtype,
                    dtype.qmin(),
                    dtype.qmax()
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Quantized tensor: integer values plus the affine mapping back to reals
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedTensor {
    values: Vec<i32>,
    shape: Vec<usize>,
    params: QuantParams,
    dtype: QuantDType,
}

impl QuantizedTensor {
    /// Wrap already-quantized values, checking length and dtype range.
    pub fn new(
        values: Vec<i32>,
        shape: Vec<usize>,
        params: QuantParams,
        dtype: QuantDType,
    ) -> Result<Self> {
        params.check_dtype(dtype)?;
        let numel: usize = shape.iter().product();
        if values.len() != numel {
            return Err(QuantizationError::QuantizationFailed {
                reason: format!(
                    "value count {} does not match shape {:?} ({} elements)",
                    values.len(),
                    shape,
                    numel
                ),
            }
            .into());
        }
        if let Some(bad) = values.iter().find(|&&q| !dtype.contains(q)) {
            return Err(QuantizationError::QuantizationFailed {
                reason: format!("value {bad} outside {dtype} range"),
            }
            .into());
        }
        Ok(Self { values, shape, params, dtype })
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn params(&self) -> QuantParams {
        self.params
    }

    pub fn dtype(&self) -> QuantDType {
        self.dtype
    }

    pub fn numel(&self) -> usize {
        self.values.len()
    }

    /// Same values viewed with a different shape of equal element count.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            return Err(QuantizationError::QuantizationFailed {
                reason: format!("cannot reshape {:?} into {:?}", self.shape, shape),
            }
            .into());
        }
        Ok(Self { shape: shape.to_vec(), ..self.clone() })
    }

    /// Real values `(q - zero_point) * scale`, row-major.
    pub fn dequantize(&self) -> Vec<f32> {
        self.values.iter().map(|&q| dequantize_value(q, self.params)).collect()
    }

    /// Dequantize into a [`HostTensor`] of the same shape.
    pub fn dequantize_to_host(&self) -> Result<HostTensor> {
        HostTensor::from_vec(self.dequantize(), &self.shape)
    }
}

/// Quantize a slice with a single scale / zero point.
pub fn quantize_slice(
    data: &[f32],
    shape: &[usize],
    params: QuantParams,
    dtype: QuantDType,
) -> Result<QuantizedTensor> {
    params.check_dtype(dtype)?;
    if let Some(bad) = data.iter().find(|v| !v.is_finite()) {
        return Err(QuantizationError::QuantizationFailed {
            reason: format!("cannot quantize non-finite value {bad}"),
        }
        .into());
    }
    let values = data.iter().map(|&x| quantize_value(x, params, dtype)).collect();
    QuantizedTensor::new(values, shape.to_vec(), params, dtype)
}

/// Per-tensor affine quantization of a host tensor.
pub fn quantize_per_tensor(
    input: &HostTensor,
    params: QuantParams,
    dtype: QuantDType,
) -> Result<QuantizedTensor> {
    let data = input.to_vec()?;
    tracing::trace!(
        numel = data.len(),
        scale = params.scale(),
        zero_point = params.zero_point(),
        %dtype,
        "quantize_per_tensor"
    );
    quantize_slice(&data, input.dims(), params, dtype)
}
