//! Structural configuration of a convolution case

use qconv_common::{ConvRank, QConvError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stride or dilation: one value for every spatial axis, or one per axis (2-D only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extent {
    Scalar(usize),
    Pair(usize, usize),
}

impl Extent {
    /// Per-axis values after lifting onto two spatial axes.
    ///
    /// A 1-D extent occupies the first axis; the trailing singleton axis is 1.
    pub fn resolve(self, rank: ConvRank) -> Result<[usize; 2]> {
        match (self, rank) {
            (Self::Scalar(v), ConvRank::One) => Ok([v, 1]),
            (Self::Scalar(v), ConvRank::Two) => Ok([v, v]),
            (Self::Pair(h, w), ConvRank::Two) => Ok([h, w]),
            (Self::Pair(..), ConvRank::One) => {
                Err(QConvError::Construction("per-axis extent requires a 2-D convolution".into()))
            }
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Pair(h, w) => write!(f, "{h}x{w}"),
        }
    }
}

/// Zero padding of the spatial axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Padding {
    /// Same amount on both sides of every axis.
    Scalar(usize),
    /// Per-axis `(h, w)`, symmetric within each axis (2-D only).
    Pair(usize, usize),
    /// Explicit begin / end amounts per axis (2-D only).
    Asymmetric { begin: (usize, usize), end: (usize, usize) },
}

impl Padding {
    /// `(pads_begin, pads_end)` lifted onto two spatial axes.
    pub fn resolve(self, rank: ConvRank) -> Result<([usize; 2], [usize; 2])> {
        match (self, rank) {
            (Self::Scalar(p), ConvRank::One) => Ok(([p, 0], [p, 0])),
            (Self::Scalar(p), ConvRank::Two) => Ok(([p, p], [p, p])),
            (Self::Pair(h, w), ConvRank::Two) => Ok(([h, w], [h, w])),
            (Self::Asymmetric { begin, end }, ConvRank::Two) => {
                Ok(([begin.0, begin.1], [end.0, end.1]))
            }
            (_, ConvRank::One) => {
                Err(QConvError::Construction("per-axis padding requires a 2-D convolution".into()))
            }
        }
    }
}

impl fmt::Display for Padding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(p) => write!(f, "{p}"),
            Self::Pair(h, w) => write!(f, "{h}x{w}"),
            Self::Asymmetric { begin, end } => {
                write!(f, "b{}x{}e{}x{}", begin.0, begin.1, end.0, end.1)
            }
        }
    }
}

/// Structural part of a convolution case.
///
/// `weights_shape` is `[out_channels, in_channels_per_group, kernel...]`; its
/// length fixes the rank (3 for 1-D, 4 for 2-D).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvStructure {
    pub weights_shape: Vec<usize>,
    pub stride: Extent,
    pub padding: Padding,
    pub dilation: Extent,
    pub groups: usize,
}

impl ConvStructure {
    /// Unit stride / dilation, no padding, one group.
    pub fn new(weights_shape: impl Into<Vec<usize>>) -> Self {
        Self {
            weights_shape: weights_shape.into(),
            stride: Extent::Scalar(1),
            padding: Padding::Scalar(0),
            dilation: Extent::Scalar(1),
            groups: 1,
        }
    }

    pub fn with_stride(mut self, stride: Extent) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_dilation(mut self, dilation: Extent) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn rank(&self) -> Result<ConvRank> {
        ConvRank::from_weight_rank(self.weights_shape.len()).ok_or_else(|| {
            QConvError::Construction(format!(
                "weights_shape must have 3 or 4 dims, got {:?}",
                self.weights_shape
            ))
        })
    }

    pub fn out_channels(&self) -> usize {
        self.weights_shape.first().copied().unwrap_or(0)
    }

    pub fn in_channels_per_group(&self) -> usize {
        self.weights_shape.get(1).copied().unwrap_or(0)
    }

    /// Declared input channel count of the module.
    pub fn in_channels(&self) -> usize {
        self.in_channels_per_group() * self.groups
    }

    pub fn kernel_shape(&self) -> &[usize] {
        self.weights_shape.get(2..).unwrap_or(&[])
    }
}

impl fmt::Display for ConvStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape: Vec<String> = self.weights_shape.iter().map(ToString::to_string).collect();
        write!(
            f,
            "w{}-s{}-p{}-d{}-g{}",
            shape.join("x"),
            self.stride,
            self.padding,
            self.dilation,
            self.groups
        )
    }
}
