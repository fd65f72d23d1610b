//! Real-valued host tensor used at the model boundary

use crate::{QConvError, Result};
use candle_core::{Device, Tensor as CandleTensor};

/// Dense `f32` tensor on the host, wrapping a Candle tensor.
///
/// Models consume and produce `HostTensor`s; quantized data lives in
/// `qconv_quantization::QuantizedTensor` instead.
#[derive(Debug, Clone)]
pub struct HostTensor {
    inner: CandleTensor,
}

impl HostTensor {
    /// Build a tensor from row-major data.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(QConvError::Shape(format!(
                "data length {} does not match shape {:?} ({} elements)",
                data.len(),
                shape,
                expected
            )));
        }
        let tensor = CandleTensor::from_vec(data, shape, &Device::Cpu)?;
        Ok(Self { inner: tensor })
    }

    pub fn dims(&self) -> &[usize] {
        self.inner.dims()
    }

    pub fn rank(&self) -> usize {
        self.inner.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.inner.elem_count()
    }

    /// Flattened row-major copy of the data.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        Ok(self.inner.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Insert a unit axis at `dim`.
    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        Ok(Self { inner: self.inner.unsqueeze(dim)? })
    }

    /// Remove a unit axis at `dim`.
    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        Ok(Self { inner: self.inner.squeeze(dim)? })
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Ok(Self { inner: self.inner.reshape(shape)? })
    }

    /// Round every element to `decimals` fractional digits, ties to even.
    pub fn round_decimals(&self, decimals: i32) -> Result<Self> {
        let factor = 10f32.powi(decimals);
        let data = self.to_vec()?.into_iter().map(|v| (v * factor).round_ties_even() / factor).collect();
        Self::from_vec(data, self.dims())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(HostTensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).is_err());
    }

    #[test]
    fn unsqueeze_adds_batch_axis() {
        let t = HostTensor::from_vec(vec![1.0; 6], &[3, 2]).unwrap();
        let t = t.unsqueeze(0).unwrap();
        assert_eq!(t.dims(), &[1, 3, 2]);
        assert_eq!(t.rank(), 3);
    }

    #[test]
    fn squeeze_removes_trailing_axis() {
        let t = HostTensor::from_vec(vec![1.0, 2.0], &[1, 2, 1]).unwrap();
        assert_eq!(t.squeeze(2).unwrap().dims(), &[1, 2]);
    }

    #[test]
    fn round_decimals_keeps_four_digits() {
        let t = HostTensor::from_vec(vec![0.123_456, 0.999_96, 0.5], &[3]).unwrap();
        let r = t.round_decimals(4).unwrap().to_vec().unwrap();
        assert!((r[0] - 0.1235).abs() < 1e-6);
        assert!((r[1] - 1.0).abs() < 1e-6);
        assert!((r[2] - 0.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn to_vec_preserves_data(data in proptest::collection::vec(-1e3f32..1e3, 1..64)) {
            let len = data.len();
            let t = HostTensor::from_vec(data.clone(), &[len]).unwrap();
            prop_assert_eq!(t.to_vec().unwrap(), data);
        }
    }
}
