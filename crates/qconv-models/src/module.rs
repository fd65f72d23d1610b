//! Immutable quantized convolution modules
//!
//! A module is built once through [`ConvVariant::construct`] and never mutated:
//! its output scale and zero point are constructor arguments. Weights are
//! `qint8` with unit scale, stored with two spatial axes for both ranks; a 1-D
//! module exposes them as rank 3 through [`QuantizedConv::weight_bias`].

use crate::structure::{Extent, Padding};
use qconv_common::{ConvRank, KernelError, QConvError, Result};
use qconv_kernels::{Activation, Conv1dConfig, Conv2dConfig, conv2d_quantized};
use qconv_quantization::{QuantDType, QuantParams, QuantizedTensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::fmt;

/// Seed of the weight generator; repeated construction yields identical weights.
pub const DEFAULT_WEIGHT_SEED: u64 = 42;

/// Weight values are drawn from `-WEIGHT_RANGE..=WEIGHT_RANGE`.
const WEIGHT_RANGE: i32 = 3;

/// Plain or ReLU-fused quantized convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvVariant {
    Plain,
    ReluFused,
}

impl ConvVariant {
    pub fn from_relu(relu: bool) -> Self {
        if relu { Self::ReluFused } else { Self::Plain }
    }

    pub fn is_relu(self) -> bool {
        matches!(self, Self::ReluFused)
    }

    pub fn activation(self) -> Activation {
        match self {
            Self::Plain => Activation::None,
            Self::ReluFused => Activation::Relu,
        }
    }

    /// Operator the variant executes as, e.g. `quantized::conv2d_relu`.
    pub fn op_name(self, rank: ConvRank) -> String {
        match self {
            Self::Plain => format!("quantized::conv{}", rank.suffix()),
            Self::ReluFused => format!("quantized::conv{}_relu", rank.suffix()),
        }
    }

    /// Module class name, e.g. `ConvReLU1d`.
    pub fn module_name(self, rank: ConvRank) -> String {
        match self {
            Self::Plain => format!("Conv{}", rank.suffix()),
            Self::ReluFused => format!("ConvReLU{}", rank.suffix()),
        }
    }

    /// Build a module of this variant.
    pub fn construct(self, spec: ConvModuleSpec) -> Result<QuantizedConv> {
        QuantizedConv::new(self, spec)
    }
}

/// Where a module's bias comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BiasSource {
    /// Standard-normal draw from an entropy-seeded generator.
    #[default]
    Random,
    /// Explicit values, one per output channel.
    Fixed(Vec<f32>),
}

/// Constructor arguments of a quantized convolution module.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvModuleSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: Vec<usize>,
    pub stride: Extent,
    pub padding: Padding,
    pub dilation: Extent,
    pub groups: usize,
    pub bias: bool,
    pub bias_source: BiasSource,
    /// Output quantization scale.
    pub scale: f32,
    /// Output quantization zero point.
    pub zero_point: i32,
    pub weight_seed: u64,
}

/// Quantized convolution module.
#[derive(Debug, Clone)]
pub struct QuantizedConv {
    variant: ConvVariant,
    rank: ConvRank,
    config: Conv2dConfig,
    /// Always `[O, I/g, kh, kw]`; 1-D kernels carry a trailing singleton axis.
    weight: QuantizedTensor,
    bias: Option<Vec<f32>>,
    output: QuantParams,
}

impl QuantizedConv {
    fn new(variant: ConvVariant, spec: ConvModuleSpec) -> Result<Self> {
        let (rank, kernel) = match spec.kernel_size.as_slice() {
            [k] => (ConvRank::One, [*k, 1]),
            [kh, kw] => (ConvRank::Two, [*kh, *kw]),
            other => {
                return Err(QConvError::Construction(format!(
                    "kernel_size must have 1 or 2 dims, got {}",
                    other.len()
                )));
            }
        };
        let (pads_begin, pads_end) = spec.padding.resolve(rank)?;
        let stride = spec.stride.resolve(rank)?;
        let dilation = spec.dilation.resolve(rank)?;
        let config = match rank {
            ConvRank::One => Conv1dConfig {
                in_channels: spec.in_channels,
                out_channels: spec.out_channels,
                kernel_size: kernel[0],
                stride: stride[0],
                padding: (pads_begin[0], pads_end[0]),
                dilation: dilation[0],
                groups: spec.groups,
                bias: spec.bias,
            }
            .lift(),
            ConvRank::Two => Conv2dConfig {
                in_channels: spec.in_channels,
                out_channels: spec.out_channels,
                kernel,
                stride,
                pads_begin,
                pads_end,
                dilation,
                groups: spec.groups,
                bias: spec.bias,
            },
        };
        config.validate().map_err(construction)?;

        let output = QuantParams::new(spec.scale, spec.zero_point).map_err(construction)?;
        if !QuantDType::QUInt8.contains(spec.zero_point) {
            return Err(QConvError::Construction(format!(
                "output zero_point {} outside quint8 range",
                spec.zero_point
            )));
        }

        let weight_shape =
            vec![config.out_channels, config.in_channels_per_group(), kernel[0], kernel[1]];
        let weight = seeded_weight(weight_shape, spec.weight_seed)?;

        let bias = if spec.bias {
            Some(match spec.bias_source {
                BiasSource::Random => random_bias(config.out_channels),
                BiasSource::Fixed(values) => {
                    if values.len() != config.out_channels {
                        return Err(QConvError::Construction(format!(
                            "bias has {} values, expected {}",
                            values.len(),
                            config.out_channels
                        )));
                    }
                    values
                }
            })
        } else {
            None
        };

        tracing::debug!(
            module = %variant.module_name(rank),
            in_channels = config.in_channels,
            out_channels = config.out_channels,
            groups = config.groups,
            scale = output.scale(),
            zero_point = output.zero_point(),
            "constructed quantized conv"
        );

        Ok(Self { variant, rank, config, weight, bias, output })
    }

    pub fn variant(&self) -> ConvVariant {
        self.variant
    }

    pub fn rank(&self) -> ConvRank {
        self.rank
    }

    pub fn op_name(&self) -> String {
        self.variant.op_name(self.rank)
    }

    /// Lifted two-axis geometry.
    pub fn config(&self) -> &Conv2dConfig {
        &self.config
    }

    pub fn output_params(&self) -> QuantParams {
        self.output
    }

    pub fn in_channels(&self) -> usize {
        self.config.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.config.out_channels
    }

    /// Weight shape as seen by callers: `[O, I/g, k]` for 1-D, `[O, I/g, kh, kw]` for 2-D.
    pub fn weight_shape(&self) -> Vec<usize> {
        let shape = self.weight.shape();
        match self.rank {
            ConvRank::One => shape[..3].to_vec(),
            ConvRank::Two => shape.to_vec(),
        }
    }

    /// Weight normalized to the module's rank, plus the bias.
    pub fn weight_bias(&self) -> Result<(QuantizedTensor, Option<&[f32]>)> {
        let weight = match self.rank {
            ConvRank::One => self.weight.reshape(&self.weight_shape())?,
            ConvRank::Two => self.weight.clone(),
        };
        Ok((weight, self.bias.as_deref()))
    }

    /// Quantized forward pass over a batched `quint8` input.
    pub fn forward(&self, input: &QuantizedTensor) -> Result<QuantizedTensor> {
        let (weight, bias) = self.weight_bias()?;

        let expected_rank = self.rank.tensor_rank();
        if input.shape().len() != expected_rank {
            return Err(QConvError::Shape(format!(
                "{} expects a rank-{expected_rank} input, got {:?}",
                self.variant.module_name(self.rank),
                input.shape()
            )));
        }

        match self.rank {
            ConvRank::Two => self.run(input, &weight, bias),
            ConvRank::One => {
                let mut lifted_shape = input.shape().to_vec();
                lifted_shape.push(1);
                let mut lifted_weight = weight.shape().to_vec();
                lifted_weight.push(1);
                let out = self.run(
                    &input.reshape(&lifted_shape)?,
                    &weight.reshape(&lifted_weight)?,
                    bias,
                )?;
                let shape = out.shape()[..3].to_vec();
                out.reshape(&shape)
            }
        }
    }

    fn run(
        &self,
        input: &QuantizedTensor,
        weight: &QuantizedTensor,
        bias: Option<&[f32]>,
    ) -> Result<QuantizedTensor> {
        conv2d_quantized(
            input,
            weight,
            bias,
            &self.config,
            self.output,
            QuantDType::QUInt8,
            self.variant.activation(),
        )
    }
}

impl fmt::Display for QuantizedConv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, kernel_size={:?}, stride={:?}, scale={}, zero_point={}, groups={})",
            self.variant.module_name(self.rank),
            self.config.in_channels,
            self.config.out_channels,
            &self.weight_shape()[2..],
            &self.config.stride[..self.rank.spatial_dims()],
            self.output.scale(),
            self.output.zero_point(),
            self.config.groups
        )
    }
}

fn construction(err: QConvError) -> QConvError {
    match err {
        QConvError::Kernel(KernelError::InvalidArguments { reason }) => {
            QConvError::Construction(reason)
        }
        QConvError::Quantization(e) => QConvError::Construction(e.to_string()),
        other => other,
    }
}

fn seeded_weight(shape: Vec<usize>, seed: u64) -> Result<QuantizedTensor> {
    let mut rng = StdRng::seed_from_u64(seed);
    let numel: usize = shape.iter().product();
    let values = (0..numel).map(|_| rng.gen_range(-WEIGHT_RANGE..=WEIGHT_RANGE)).collect();
    QuantizedTensor::new(values, shape, QuantParams::unit(), QuantDType::QInt8)
}

fn random_bias(len: usize) -> Vec<f32> {
    let mut rng = StdRng::from_entropy();
    (0..len).map(|_| rng.sample(StandardNormal)).collect()
}
