//! Loopback conversion: lower traced graphs onto the reference float kernels.
//!
//! The frontend lowers a quantized convolution the way an IR translator
//! would: quantize / dequantize pairs become fake-quantize ops, the packed
//! weight is dequantized into a float `Convolution` (or `GroupConvolution`
//! when `groups > 1`), bias becomes a channel-wise add, the fused ReLU a
//! separate op. 1-D convolutions are lowered as 2-D over a trailing
//! singleton axis. The backend then interprets the lowered program.

use crate::driver::{ConversionFrontend, ConvertedModel, ExecutionBackend, TargetSpec};
use half::f16;
use qconv_common::{ConvRank, HostTensor, KernelError, Precision, QConvError, Result};
use qconv_kernels::{Conv2dConfig, conv2d_f32};
use qconv_models::{PackedConvParams, ParamSource, TracedGraph, TracedNode};
use qconv_quantization::{QuantDType, QuantParams, dequantize_value, quantize_value};

/// Axis the 1-D lowering inserts and removes.
const SINGLETON_AXIS: usize = 3;

/// One operation of a lowered program.
#[derive(Debug, Clone, PartialEq)]
pub enum LoweredOp {
    FakeQuantize { params: QuantParams, dtype: QuantDType },
    Unsqueeze { axis: usize },
    Squeeze { axis: usize },
    Convolution { weight: Vec<f32>, config: Conv2dConfig },
    GroupConvolution { weight: Vec<f32>, config: Conv2dConfig },
    AddBias { bias: Vec<f32> },
    Relu,
}

impl LoweredOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FakeQuantize { .. } => "FakeQuantize",
            Self::Unsqueeze { .. } => "Unsqueeze",
            Self::Squeeze { .. } => "Squeeze",
            Self::Convolution { .. } => "Convolution",
            Self::GroupConvolution { .. } => "GroupConvolution",
            Self::AddBias { .. } => "Add",
            Self::Relu => "Relu",
        }
    }
}

/// Straight-line program produced by [`LoopbackFrontend`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredProgram {
    ops: Vec<LoweredOp>,
    translated: Vec<String>,
}

impl LoweredProgram {
    pub fn ops(&self) -> &[LoweredOp] {
        &self.ops
    }

    pub fn op_names(&self) -> Vec<&'static str> {
        self.ops.iter().map(LoweredOp::name).collect()
    }
}

impl ConvertedModel for LoweredProgram {
    fn translated_ops(&self) -> &[String] {
        &self.translated
    }
}

/// Lowers traced single-operator graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackFrontend;

impl LoopbackFrontend {
    fn lower_conv(
        &self,
        op: &str,
        packed: &PackedConvParams,
        output: QuantParams,
        ops: &mut Vec<LoweredOp>,
    ) -> Result<()> {
        let (rank, relu) = match op {
            "quantized::conv1d" => (ConvRank::One, false),
            "quantized::conv1d_relu" => (ConvRank::One, true),
            "quantized::conv2d" => (ConvRank::Two, false),
            "quantized::conv2d_relu" => (ConvRank::Two, true),
            other => {
                return Err(QConvError::Conversion(format!("no translator for {other}")));
            }
        };

        let wshape = packed.weight.shape();
        if wshape.len() != rank.tensor_rank() {
            return Err(QConvError::Conversion(format!(
                "{op} expects a rank-{} weight, got {wshape:?}",
                rank.tensor_rank()
            )));
        }
        let lift = |v: &[usize], fill: usize| -> Result<[usize; 2]> {
            match (rank, v) {
                (ConvRank::One, [a]) => Ok([*a, fill]),
                (ConvRank::Two, [a, b]) => Ok([*a, *b]),
                _ => Err(QConvError::Conversion(format!("{op}: malformed packed parameter {v:?}"))),
            }
        };
        let config = Conv2dConfig {
            in_channels: wshape[1] * packed.groups,
            out_channels: wshape[0],
            kernel: [wshape[2], wshape.get(3).copied().unwrap_or(1)],
            stride: lift(&packed.stride, 1)?,
            pads_begin: lift(&packed.pads_begin, 0)?,
            pads_end: lift(&packed.pads_end, 0)?,
            dilation: lift(&packed.dilation, 1)?,
            groups: packed.groups,
            bias: false,
        };
        let weight = packed.weight.dequantize();

        if rank == ConvRank::One {
            ops.push(LoweredOp::Unsqueeze { axis: SINGLETON_AXIS });
        }
        ops.push(if config.groups == 1 {
            LoweredOp::Convolution { weight, config }
        } else {
            LoweredOp::GroupConvolution { weight, config }
        });
        if let Some(bias) = &packed.bias {
            ops.push(LoweredOp::AddBias { bias: bias.clone() });
        }
        if relu {
            ops.push(LoweredOp::Relu);
        }
        if rank == ConvRank::One {
            ops.push(LoweredOp::Squeeze { axis: SINGLETON_AXIS });
        }
        ops.push(LoweredOp::FakeQuantize { params: output, dtype: QuantDType::QUInt8 });
        Ok(())
    }
}

impl ConversionFrontend for LoopbackFrontend {
    type Model = LoweredProgram;

    fn name(&self) -> &str {
        "loopback"
    }

    fn convert(&self, graph: &TracedGraph) -> Result<LoweredProgram> {
        let mut ops = Vec::new();
        let mut translated = Vec::new();
        let mut packed: Option<PackedConvParams> = None;

        for node in graph.nodes() {
            match node {
                TracedNode::Unsqueeze { dim } => ops.push(LoweredOp::Unsqueeze { axis: *dim }),
                TracedNode::QuantizePerTensor { params, dtype } => {
                    ops.push(LoweredOp::FakeQuantize { params: *params, dtype: *dtype });
                }
                TracedNode::PackedParams { source, items } => {
                    if *source != ParamSource::GetAttr {
                        return Err(QConvError::Conversion(format!(
                            "incorrect packed params node {}, expected prim::GetAttr",
                            source.kind()
                        )));
                    }
                    packed = Some(PackedConvParams::from_items(items)?);
                }
                TracedNode::QuantizedConv { op, output } => {
                    let params = packed.take().ok_or_else(|| {
                        QConvError::Conversion(format!("{op} has no packed params input"))
                    })?;
                    self.lower_conv(op, &params, *output, &mut ops)?;
                }
                TracedNode::Dequantize => {}
            }
            translated.push(node.kind().to_string());
        }

        tracing::debug!(ops = ?ops.iter().map(LoweredOp::name).collect::<Vec<_>>(), "lowered graph");
        Ok(LoweredProgram { ops, translated })
    }
}

/// Interprets lowered programs on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackBackend;

impl LoopbackBackend {
    fn check_device(target: &TargetSpec) -> Result<()> {
        if target.device.eq_ignore_ascii_case("CPU") {
            Ok(())
        } else {
            Err(KernelError::UnsupportedDevice { device: target.device.clone() }.into())
        }
    }

    fn apply(op: &LoweredOp, x: HostTensor, precision: Precision) -> Result<HostTensor> {
        match op {
            LoweredOp::FakeQuantize { params, dtype } => {
                let data = x
                    .to_vec()?
                    .into_iter()
                    .map(|v| dequantize_value(quantize_value(v, *params, *dtype), *params))
                    .collect();
                HostTensor::from_vec(data, x.dims())
            }
            LoweredOp::Unsqueeze { axis } => x.unsqueeze(*axis),
            LoweredOp::Squeeze { axis } => x.squeeze(*axis),
            LoweredOp::Convolution { weight, config }
            | LoweredOp::GroupConvolution { weight, config } => {
                let shape: [usize; 4] = x.dims().try_into().map_err(|_| {
                    QConvError::Shape(format!("convolution expects a rank-4 input, got {:?}", x.dims()))
                })?;
                let weight = round_to(weight.clone(), precision);
                let out = conv2d_f32(&x.to_vec()?, shape, &weight, None, config)?;
                let [out_h, out_w] = config.output_size([shape[2], shape[3]]);
                HostTensor::from_vec(out, &[shape[0], config.out_channels, out_h, out_w])
            }
            LoweredOp::AddBias { bias } => {
                let dims = x.dims().to_vec();
                if dims.len() < 2 || dims[1] != bias.len() {
                    return Err(QConvError::Shape(format!(
                        "bias of {} values does not broadcast over {dims:?}",
                        bias.len()
                    )));
                }
                let plane: usize = dims[2..].iter().product();
                let bias = round_to(bias.clone(), precision);
                let mut data = x.to_vec()?;
                for (i, chunk) in data.chunks_mut(plane.max(1)).enumerate() {
                    let b = bias[i % bias.len()];
                    chunk.iter_mut().for_each(|v| *v += b);
                }
                HostTensor::from_vec(data, &dims)
            }
            LoweredOp::Relu => {
                let data = x.to_vec()?.into_iter().map(|v| v.max(0.0)).collect();
                HostTensor::from_vec(data, x.dims())
            }
        }
    }
}

impl ExecutionBackend<LoweredProgram> for LoopbackBackend {
    fn name(&self) -> &str {
        "loopback-cpu"
    }

    fn execute(
        &self,
        model: &LoweredProgram,
        input: &HostTensor,
        target: &TargetSpec,
    ) -> Result<HostTensor> {
        Self::check_device(target)?;
        // The input stays f32 until its FakeQuantize has run.
        let mut x = input.clone();
        let mut quantized = false;
        for op in model.ops() {
            x = Self::apply(op, x, target.precision)?;
            quantized |= matches!(op, LoweredOp::FakeQuantize { .. });
            if quantized {
                x = round_tensor(x, target.precision)?;
            }
        }
        Ok(x)
    }
}

fn round_to(values: Vec<f32>, precision: Precision) -> Vec<f32> {
    match precision {
        Precision::FP32 => values,
        Precision::FP16 => values.into_iter().map(|v| f16::from_f32(v).to_f32()).collect(),
    }
}

fn round_tensor(x: HostTensor, precision: Precision) -> Result<HostTensor> {
    match precision {
        Precision::FP32 => Ok(x),
        Precision::FP16 => HostTensor::from_vec(round_to(x.to_vec()?, precision), x.dims()),
    }
}
