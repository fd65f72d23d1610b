//! Small shared enums

use crate::{QConvError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Spatial rank of a convolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvRank {
    #[serde(rename = "1d")]
    One,
    #[serde(rename = "2d")]
    Two,
}

impl ConvRank {
    /// Number of spatial axes.
    pub fn spatial_dims(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Rank of a batched `(N, C, spatial...)` tensor.
    pub fn tensor_rank(self) -> usize {
        self.spatial_dims() + 2
    }

    /// Infer the rank from a weight shape `[O, I/g, k...]`.
    pub fn from_weight_rank(rank: usize) -> Option<Self> {
        match rank {
            3 => Some(Self::One),
            4 => Some(Self::Two),
            _ => None,
        }
    }

    /// Suffix used in operator names (`conv1d`, `conv2d`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::One => "1d",
            Self::Two => "2d",
        }
    }
}

impl fmt::Display for ConvRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for ConvRank {
    type Err = QConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "1d" | "1" | "conv1d" => Ok(Self::One),
            "2d" | "2" | "conv2d" => Ok(Self::Two),
            other => Err(QConvError::Config(format!("unknown convolution rank: {other}"))),
        }
    }
}

/// Numeric precision requested from the execution backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Precision {
    FP32,
    FP16,
}

impl Precision {
    pub fn name(self) -> &'static str {
        match self {
            Self::FP32 => "FP32",
            Self::FP16 => "FP16",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Precision {
    type Err = QConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FP32" | "F32" => Ok(Self::FP32),
            "FP16" | "F16" => Ok(Self::FP16),
            other => Err(QConvError::Config(format!("unknown precision: {other}"))),
        }
    }
}
