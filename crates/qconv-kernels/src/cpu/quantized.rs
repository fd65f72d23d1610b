//! Integer-arithmetic quantized convolution.
//!
//! Given a `quint8` input `(xq, sx, zx)`, a `qint8` weight `(wq, sw, zw)` and
//! an `f32` bias, each output element is
//!
//! ```text
//! acc  = Σ (xq - zx) · (wq - zw)
//! real = acc · sx · sw + bias[oc]
//! real = max(real, 0)            (fused ReLU only)
//! q    = clamp(round(real / so) + zo)
//! ```
//!
//! Padded taps contribute zero to `acc`, i.e. they stand for real `0.0`.

use super::conv::{Conv2dConfig, accumulate, invalid};
use qconv_common::Result;
use qconv_quantization::{QuantDType, QuantParams, QuantizedTensor, requantize};

/// Activation fused into the requantization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    None,
    Relu,
}

impl Activation {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        match self {
            Self::None => x,
            Self::Relu => x.max(0.0),
        }
    }
}

/// Quantized grouped 2-D convolution.
///
/// `input` must be rank 4 `[N, C, H, W]` and `weight` rank 4
/// `[O, C / groups, kh, kw]`. The result is `[N, O, out_h, out_w]` in
/// `output_dtype` with `output` params.
pub fn conv2d_quantized(
    input: &QuantizedTensor,
    weight: &QuantizedTensor,
    bias: Option<&[f32]>,
    config: &Conv2dConfig,
    output: QuantParams,
    output_dtype: QuantDType,
    activation: Activation,
) -> Result<QuantizedTensor> {
    let input_shape: [usize; 4] = input
        .shape()
        .try_into()
        .map_err(|_| invalid(&format!("quantized input must be rank 4, got {:?}", input.shape())))?;
    let expected_weight =
        [config.out_channels, config.in_channels_per_group(), config.kernel[0], config.kernel[1]];
    if weight.shape() != expected_weight {
        return Err(invalid(&format!(
            "weight shape {:?} does not match expected {:?}",
            weight.shape(),
            expected_weight
        )));
    }
    let out_hw = config.validate_operands(input.numel(), input_shape, weight.numel(), bias)?;

    let zx = input.params().zero_point() as i64;
    let zw = weight.params().zero_point() as i64;
    let xs: Vec<i64> = input.values().iter().map(|&q| q as i64 - zx).collect();
    let ws: Vec<i64> = weight.values().iter().map(|&q| q as i64 - zw).collect();

    let acc = accumulate(&xs, input_shape, &ws, config, out_hw, 0i64, |acc, x, w| acc + x * w);

    let multiplier = input.params().scale() * weight.params().scale();
    let plane = out_hw[0] * out_hw[1];
    let values = acc
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            let oc = (i / plane) % config.out_channels;
            let b = match bias {
                Some(b) if config.bias => b[oc],
                _ => 0.0,
            };
            let real = activation.apply(a as f32 * multiplier + b);
            requantize(real, output, output_dtype)
        })
        .collect();

    tracing::trace!(?input_shape, ?out_hw, ?activation, "conv2d_quantized");
    QuantizedTensor::new(
        values,
        vec![input_shape[0], config.out_channels, out_hw[0], out_hw[1]],
        output,
        output_dtype,
    )
}
