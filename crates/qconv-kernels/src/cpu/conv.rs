//! Grouped 2-D convolution on contiguous `f32` slices, with 1-D lifted onto it.
//!
//! # Layout
//!
//! * `input`:  `[batch, in_channels, height, width]`
//! * `weight`: `[out_channels, in_channels / groups, kernel_h, kernel_w]`
//! * `bias`:   `[out_channels]` (optional)
//! * output:   `[batch, out_channels, out_h, out_w]`
//!
//! A 1-D convolution over `[batch, channels, length]` is the same computation
//! with `width == kernel_w == 1`; [`Conv1dConfig::lift`] builds that config.

use qconv_common::{KernelError, QConvError, Result};

// ── Configuration ──────────────────────────────────────────────────

/// Geometry of a grouped 2-D convolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conv2dConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    /// `[kernel_h, kernel_w]`
    pub kernel: [usize; 2],
    pub stride: [usize; 2],
    /// Zero padding before the first element of each spatial axis.
    pub pads_begin: [usize; 2],
    /// Zero padding after the last element of each spatial axis.
    pub pads_end: [usize; 2],
    pub dilation: [usize; 2],
    pub groups: usize,
    /// Whether a bias vector is expected.
    pub bias: bool,
}

impl Conv2dConfig {
    /// Unit stride and dilation, no padding, one group, no bias.
    pub fn new(in_channels: usize, out_channels: usize, kernel: [usize; 2]) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            stride: [1, 1],
            pads_begin: [0, 0],
            pads_end: [0, 0],
            dilation: [1, 1],
            groups: 1,
            bias: false,
        }
    }

    /// Input channels seen by each output channel.
    pub fn in_channels_per_group(&self) -> usize {
        self.in_channels / self.groups.max(1)
    }

    /// Expected weight element count.
    pub fn weight_len(&self) -> usize {
        self.out_channels * self.in_channels_per_group() * self.kernel[0] * self.kernel[1]
    }

    /// Output spatial extent `[out_h, out_w]` for an input of `[h, w]`.
    pub fn output_size(&self, input: [usize; 2]) -> [usize; 2] {
        [0, 1].map(|axis| {
            compute_output_size(
                input[axis],
                self.kernel[axis],
                self.stride[axis],
                self.pads_begin[axis],
                self.pads_end[axis],
                self.dilation[axis],
            )
        })
    }

    /// Check the geometry alone, independent of any tensor.
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 {
            return Err(invalid("in_channels must be > 0"));
        }
        if self.out_channels == 0 {
            return Err(invalid("out_channels must be > 0"));
        }
        if self.kernel.contains(&0) {
            return Err(invalid("kernel size must be > 0"));
        }
        if self.stride.contains(&0) {
            return Err(invalid("stride must be > 0"));
        }
        if self.dilation.contains(&0) {
            return Err(invalid("dilation must be > 0"));
        }
        if self.groups == 0 {
            return Err(invalid("groups must be > 0"));
        }
        if !self.in_channels.is_multiple_of(self.groups) {
            return Err(invalid("in_channels must be divisible by groups"));
        }
        if !self.out_channels.is_multiple_of(self.groups) {
            return Err(invalid("out_channels must be divisible by groups"));
        }
        Ok(())
    }

    /// Validate operands against the geometry and return the output extent.
    pub(crate) fn validate_operands(
        &self,
        input_len: usize,
        input_shape: [usize; 4],
        weight_len: usize,
        bias: Option<&[f32]>,
    ) -> Result<[usize; 2]> {
        self.validate()?;
        let [batch, channels, height, width] = input_shape;
        if batch * channels * height * width != input_len {
            return Err(invalid(&format!(
                "input length {input_len} does not match shape {input_shape:?}"
            )));
        }
        if channels != self.in_channels {
            return Err(invalid(&format!(
                "input has {channels} channels, expected {}",
                self.in_channels
            )));
        }
        if height == 0 || width == 0 {
            return Err(invalid("input spatial extent must be > 0"));
        }
        if weight_len != self.weight_len() {
            return Err(invalid(&format!(
                "weight length mismatch: expected {}, got {weight_len}",
                self.weight_len()
            )));
        }
        if self.bias {
            match bias {
                Some(b) if b.len() != self.out_channels => {
                    return Err(invalid(&format!(
                        "bias length mismatch: expected {}, got {}",
                        self.out_channels,
                        b.len()
                    )));
                }
                None => return Err(invalid("config.bias is true but no bias provided")),
                _ => {}
            }
        }
        let out = self.output_size([height, width]);
        if out.contains(&0) {
            return Err(invalid(
                "convolution produces empty output (kernel larger than padded input)",
            ));
        }
        Ok(out)
    }
}

/// 1-D convolution geometry over `[batch, channels, length]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conv1dConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    /// `(begin, end)` zero padding.
    pub padding: (usize, usize),
    pub dilation: usize,
    pub groups: usize,
    pub bias: bool,
}

impl Conv1dConfig {
    /// Equivalent 2-D geometry with a trailing singleton axis.
    pub fn lift(&self) -> Conv2dConfig {
        Conv2dConfig {
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            kernel: [self.kernel_size, 1],
            stride: [self.stride, 1],
            pads_begin: [self.padding.0, 0],
            pads_end: [self.padding.1, 0],
            dilation: [self.dilation, 1],
            groups: self.groups,
            bias: self.bias,
        }
    }
}

/// Output extent along one axis; zero when the dilated kernel does not fit.
pub fn compute_output_size(
    input: usize,
    kernel: usize,
    stride: usize,
    pad_begin: usize,
    pad_end: usize,
    dilation: usize,
) -> usize {
    if kernel == 0 || stride == 0 || dilation == 0 {
        return 0;
    }
    let effective = dilation * (kernel - 1) + 1;
    let padded = input + pad_begin + pad_end;
    if padded < effective { 0 } else { (padded - effective) / stride + 1 }
}

pub(crate) fn invalid(reason: &str) -> QConvError {
    KernelError::InvalidArguments { reason: reason.to_string() }.into()
}

// ── Accumulation core ──────────────────────────────────────────────

/// Grouped convolution over any element type.
///
/// Out-of-bounds taps are skipped, so padded positions contribute the
/// additive identity. Callers working in a shifted integer domain must
/// subtract zero points before calling.
pub(crate) fn accumulate<T: Copy, A: Copy>(
    input: &[T],
    input_shape: [usize; 4],
    weight: &[T],
    config: &Conv2dConfig,
    out_hw: [usize; 2],
    zero: A,
    mac: impl Fn(A, T, T) -> A,
) -> Vec<A> {
    let [batch, in_c, in_h, in_w] = input_shape;
    let [out_h, out_w] = out_hw;
    let [k_h, k_w] = config.kernel;
    let ic_per_group = config.in_channels / config.groups;
    let oc_per_group = config.out_channels / config.groups;

    let mut output = vec![zero; batch * config.out_channels * out_h * out_w];

    for n in 0..batch {
        let in_base = n * in_c * in_h * in_w;
        for g in 0..config.groups {
            for oc_local in 0..oc_per_group {
                let oc = g * oc_per_group + oc_local;
                let out_base = (n * config.out_channels + oc) * out_h * out_w;
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut acc = zero;
                        for ic_local in 0..ic_per_group {
                            let ic = g * ic_per_group + ic_local;
                            let plane = in_base + ic * in_h * in_w;
                            let w_base = (oc * ic_per_group + ic_local) * k_h * k_w;
                            for kh in 0..k_h {
                                let ih = oh * config.stride[0] + kh * config.dilation[0];
                                if ih < config.pads_begin[0] || ih - config.pads_begin[0] >= in_h {
                                    continue;
                                }
                                let ih = ih - config.pads_begin[0];
                                for kw in 0..k_w {
                                    let iw = ow * config.stride[1] + kw * config.dilation[1];
                                    if iw < config.pads_begin[1] || iw - config.pads_begin[1] >= in_w {
                                        continue;
                                    }
                                    let iw = iw - config.pads_begin[1];
                                    acc = mac(
                                        acc,
                                        input[plane + ih * in_w + iw],
                                        weight[w_base + kh * k_w + kw],
                                    );
                                }
                            }
                        }
                        output[out_base + oh * out_w + ow] = acc;
                    }
                }
            }
        }
    }

    output
}

// ── f32 kernels ────────────────────────────────────────────────────

/// Grouped 2-D convolution in `f32`.
pub fn conv2d_f32(
    input: &[f32],
    input_shape: [usize; 4],
    weight: &[f32],
    bias: Option<&[f32]>,
    config: &Conv2dConfig,
) -> Result<Vec<f32>> {
    let out_hw = config.validate_operands(input.len(), input_shape, weight.len(), bias)?;
    tracing::trace!(?input_shape, ?out_hw, groups = config.groups, "conv2d_f32");

    let mut output = accumulate(input, input_shape, weight, config, out_hw, 0.0f32, |acc, x, w| {
        acc + x * w
    });

    if let Some(b) = bias
        && config.bias
    {
        let plane = out_hw[0] * out_hw[1];
        for (i, chunk) in output.chunks_mut(plane).enumerate() {
            let bias_val = b[i % config.out_channels];
            for v in chunk {
                *v += bias_val;
            }
        }
    }

    Ok(output)
}

// ── Tests ──────────────────────────────────────────────────────────
