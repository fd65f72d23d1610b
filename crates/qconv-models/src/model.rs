//! Single-operator wrapper model: quantize → quantized conv → dequantize

use crate::module::QuantizedConv;
use qconv_common::{ConvRank, HostTensor, QConvError, Result};
use qconv_quantization::{QuantDType, QuantParams, QuantizedTensor, quantize_per_tensor};

/// Model wrapping exactly one quantized convolution.
///
/// The input is quantized to `quint8` with unit scale and zero point 0. A 1-D
/// model also accepts unbatched `(C, L)` inputs and promotes them to `(1, C, L)`.
#[derive(Debug, Clone)]
pub struct SynthesizedModel {
    conv: QuantizedConv,
    input_params: QuantParams,
}

impl SynthesizedModel {
    pub fn new(conv: QuantizedConv) -> Self {
        Self { conv, input_params: QuantParams::unit() }
    }

    pub fn conv(&self) -> &QuantizedConv {
        &self.conv
    }

    pub fn input_params(&self) -> QuantParams {
        self.input_params
    }

    pub fn rank(&self) -> ConvRank {
        self.conv.rank()
    }

    /// Add the batch axis to an unbatched 1-D input; other inputs pass through.
    pub fn promote(&self, input: &HostTensor) -> Result<(HostTensor, bool)> {
        if self.rank() == ConvRank::One && input.rank() == 2 {
            Ok((input.unsqueeze(0)?, true))
        } else {
            Ok((input.clone(), false))
        }
    }

    pub fn quantize_input(&self, input: &HostTensor) -> Result<QuantizedTensor> {
        quantize_per_tensor(input, self.input_params, QuantDType::QUInt8)
    }

    /// Run the model on a real-valued input.
    pub fn forward(&self, input: &HostTensor) -> Result<HostTensor> {
        let (input, _) = self.promote(input)?;
        let expected = self.rank().tensor_rank();
        if input.rank() != expected {
            return Err(QConvError::Shape(format!(
                "expected a rank-{expected} input, got {:?}",
                input.dims()
            )));
        }
        let xq = self.quantize_input(&input)?;
        let yq = self.conv.forward(&xq)?;
        yq.dequantize_to_host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{BiasSource, ConvModuleSpec, ConvVariant, DEFAULT_WEIGHT_SEED};
    use crate::structure::{Extent, Padding};

    fn conv1d(relu: bool) -> QuantizedConv {
        ConvVariant::from_relu(relu)
            .construct(ConvModuleSpec {
                in_channels: 3,
                out_channels: 2,
                kernel_size: vec![3],
                stride: Extent::Scalar(1),
                padding: Padding::Scalar(0),
                dilation: Extent::Scalar(1),
                groups: 1,
                bias: false,
                bias_source: BiasSource::Random,
                scale: 1.0,
                zero_point: 0,
                weight_seed: DEFAULT_WEIGHT_SEED,
            })
            .unwrap()
    }

    #[test]
    fn unbatched_1d_input_is_promoted() {
        let model = SynthesizedModel::new(conv1d(false));
        let x = HostTensor::from_vec(vec![0.5; 3 * 10], &[3, 10]).unwrap();
        let y = model.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 2, 8]);
    }

    #[test]
    fn batched_1d_input_keeps_batch() {
        let model = SynthesizedModel::new(conv1d(false));
        let x = HostTensor::from_vec(vec![0.5; 2 * 3 * 10], &[2, 3, 10]).unwrap();
        assert_eq!(model.forward(&x).unwrap().dims(), &[2, 2, 8]);
    }

    #[test]
    fn relu_output_is_non_negative() {
        let model = SynthesizedModel::new(conv1d(true));
        let data: Vec<f32> = (0..3 * 10).map(|v| (v % 4) as f32).collect();
        let x = HostTensor::from_vec(data, &[1, 3, 10]).unwrap();
        assert!(model.forward(&x).unwrap().to_vec().unwrap().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn wrong_rank_is_a_shape_error() {
        let model = SynthesizedModel::new(conv1d(false));
        let x = HostTensor::from_vec(vec![0.0; 4], &[1, 1, 2, 2]).unwrap();
        assert!(matches!(model.forward(&x), Err(QConvError::Shape(_))));
    }
}
