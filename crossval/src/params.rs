//! Parameter space of the conformance sweep
//!
//! A case is one structural configuration combined with one value of each
//! axis: bias, fused ReLU, output scale and output zero point. Every listed
//! structure is valid by construction, so enumeration never validates.

use qconv_common::{ConvRank, Result};
use qconv_models::{BiasSource, ConvStructure, Extent, Padding, SynthesizedCase, synthesize};
use qconv_testing_policy::{CaseMarks, TestTier};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BIAS_VALUES: [bool; 2] = [true, false];
pub const RELU_VALUES: [bool; 2] = [true, false];
pub const SCALE_VALUES: [f32; 3] = [1.0, 0.3, 1.3];
pub const ZERO_POINT_VALUES: [i32; 2] = [0, 1];

/// 2-D structures: baseline, output channels, stride, padding, dilation,
/// per-axis padding both ways, depthwise grouping and begin / end padding.
pub fn conv2d_structures() -> Vec<ConvStructure> {
    vec![
        ConvStructure::new([1, 3, 3, 3]),
        ConvStructure::new([2, 3, 3, 3]),
        ConvStructure::new([2, 3, 3, 3]).with_stride(Extent::Scalar(2)),
        ConvStructure::new([2, 3, 3, 3]).with_padding(Padding::Scalar(1)),
        ConvStructure::new([2, 3, 3, 3]).with_dilation(Extent::Scalar(2)),
        ConvStructure::new([2, 3, 3, 3]).with_padding(Padding::Pair(0, 1)),
        ConvStructure::new([2, 3, 3, 3]).with_padding(Padding::Pair(1, 0)),
        ConvStructure::new([3, 1, 3, 3]).with_groups(3),
        ConvStructure::new([2, 3, 3, 3])
            .with_padding(Padding::Asymmetric { begin: (1, 0), end: (0, 1) }),
    ]
}

/// 1-D structures: the 2-D list without per-axis or asymmetric padding.
pub fn conv1d_structures() -> Vec<ConvStructure> {
    vec![
        ConvStructure::new([1, 3, 3]),
        ConvStructure::new([2, 3, 3]),
        ConvStructure::new([2, 3, 3]).with_stride(Extent::Scalar(2)),
        ConvStructure::new([2, 3, 3]).with_padding(Padding::Scalar(1)),
        ConvStructure::new([2, 3, 3]).with_dilation(Extent::Scalar(2)),
        ConvStructure::new([3, 1, 3]).with_groups(3),
    ]
}

/// One point of the parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseParams {
    pub rank: ConvRank,
    pub structure: ConvStructure,
    pub bias: bool,
    pub relu: bool,
    pub scale: f32,
    pub zero_point: i32,
    pub marks: CaseMarks,
}

impl CaseParams {
    /// Stable identifier naming the full parameter tuple.
    pub fn id(&self) -> String {
        format!(
            "conv{}[{}|bias={}|relu={}|scale={}|zp={}]",
            self.rank.suffix(),
            self.structure,
            self.bias,
            self.relu,
            self.scale,
            self.zero_point
        )
    }

    pub fn synthesize(&self, bias_source: BiasSource) -> Result<SynthesizedCase> {
        synthesize(&self.structure, self.bias, self.relu, self.scale, self.zero_point, bias_source)
    }
}

impl fmt::Display for CaseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Cartesian product of structures and axis values for one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    pub rank: ConvRank,
    pub structures: Vec<ConvStructure>,
    pub bias: Vec<bool>,
    pub relu: Vec<bool>,
    pub scales: Vec<f32>,
    pub zero_points: Vec<i32>,
    pub marks: CaseMarks,
}

impl ParameterSpace {
    pub fn for_rank(rank: ConvRank) -> Self {
        let structures = match rank {
            ConvRank::One => conv1d_structures(),
            ConvRank::Two => conv2d_structures(),
        };
        Self {
            rank,
            structures,
            bias: BIAS_VALUES.to_vec(),
            relu: RELU_VALUES.to_vec(),
            scales: SCALE_VALUES.to_vec(),
            zero_points: ZERO_POINT_VALUES.to_vec(),
            marks: CaseMarks::conformance(),
        }
    }

    pub fn conv1d() -> Self {
        Self::for_rank(ConvRank::One)
    }

    pub fn conv2d() -> Self {
        Self::for_rank(ConvRank::Two)
    }

    pub fn len(&self) -> usize {
        self.structures.len()
            * self.bias.len()
            * self.relu.len()
            * self.scales.len()
            * self.zero_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every case, structure-major, in a fixed order.
    pub fn cases(&self) -> Vec<CaseParams> {
        let mut cases = Vec::with_capacity(self.len());
        for structure in &self.structures {
            for &bias in &self.bias {
                for &relu in &self.relu {
                    for &scale in &self.scales {
                        for &zero_point in &self.zero_points {
                            cases.push(CaseParams {
                                rank: self.rank,
                                structure: structure.clone(),
                                bias,
                                relu,
                                scale,
                                zero_point,
                                marks: self.marks.clone(),
                            });
                        }
                    }
                }
            }
        }
        cases
    }

    pub fn filtered(&self, filter: &CaseFilter) -> Vec<CaseParams> {
        self.cases().into_iter().filter(|c| filter.matches(c)).collect()
    }
}

/// Selection over the parameter axes. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilter {
    /// Substring of the structure label, e.g. `g3` or `p0x1`.
    pub params: Option<String>,
    pub bias: Option<bool>,
    pub relu: Option<bool>,
    pub scale: Option<f32>,
    pub zero_point: Option<i32>,
    pub tier: Option<TestTier>,
}

impl CaseFilter {
    pub fn matches(&self, case: &CaseParams) -> bool {
        self.params.as_ref().is_none_or(|p| case.structure.to_string().contains(p.as_str()))
            && self.bias.is_none_or(|b| case.bias == b)
            && self.relu.is_none_or(|r| case.relu == r)
            && self.scale.is_none_or(|s| (case.scale - s).abs() < 1e-6)
            && self.zero_point.is_none_or(|z| case.zero_point == z)
            && self.tier.is_none_or(|t| case.marks.in_tier(t))
    }
}
