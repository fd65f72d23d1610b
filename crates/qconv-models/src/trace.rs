//! Operator-level trace of a synthesized model
//!
//! Tracing runs the model once on an example input and records every
//! operator it executes. Packed convolution parameters are recorded as an
//! attribute read (`prim::GetAttr`) unless the trace is frozen, in which case
//! they are inlined as a `prim::Constant`.

use crate::model::SynthesizedModel;
use qconv_common::{ConvRank, HostTensor, QConvError, Result};
use qconv_quantization::{QuantDType, QuantParams, QuantizedTensor};
use std::fmt;

/// How packed parameters reach the convolution node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    GetAttr,
    Constant,
}

impl ParamSource {
    pub fn kind(self) -> &'static str {
        match self {
            Self::GetAttr => "prim::GetAttr",
            Self::Constant => "prim::Constant",
        }
    }
}

/// One entry of a packed parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum PackedItem {
    Weight(QuantizedTensor),
    Bias(Option<Vec<f32>>),
    Stride(Vec<usize>),
    Padding { begin: Vec<usize>, end: Vec<usize> },
    Dilation(Vec<usize>),
    Groups(usize),
}

/// Typed view of the six packed convolution parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedConvParams {
    /// Rank-normalized weight: `[O, I/g, k...]`.
    pub weight: QuantizedTensor,
    pub bias: Option<Vec<f32>>,
    pub stride: Vec<usize>,
    pub pads_begin: Vec<usize>,
    pub pads_end: Vec<usize>,
    pub dilation: Vec<usize>,
    pub groups: usize,
}

impl PackedConvParams {
    pub const ITEM_COUNT: usize = 6;

    /// Packed order: weight, bias, stride, padding, dilation, groups.
    pub fn into_items(self) -> Vec<PackedItem> {
        vec![
            PackedItem::Weight(self.weight),
            PackedItem::Bias(self.bias),
            PackedItem::Stride(self.stride),
            PackedItem::Padding { begin: self.pads_begin, end: self.pads_end },
            PackedItem::Dilation(self.dilation),
            PackedItem::Groups(self.groups),
        ]
    }

    pub fn from_items(items: &[PackedItem]) -> Result<Self> {
        match items {
            [
                PackedItem::Weight(weight),
                PackedItem::Bias(bias),
                PackedItem::Stride(stride),
                PackedItem::Padding { begin, end },
                PackedItem::Dilation(dilation),
                PackedItem::Groups(groups),
            ] => Ok(Self {
                weight: weight.clone(),
                bias: bias.clone(),
                stride: stride.clone(),
                pads_begin: begin.clone(),
                pads_end: end.clone(),
                dilation: dilation.clone(),
                groups: *groups,
            }),
            _ if items.len() != Self::ITEM_COUNT => Err(QConvError::Conversion(format!(
                "packed parameters for quantized conv should contain {} items, got {}",
                Self::ITEM_COUNT,
                items.len()
            ))),
            _ => Err(QConvError::Conversion(
                "packed parameters are not in weight, bias, stride, padding, dilation, groups order"
                    .into(),
            )),
        }
    }
}

/// A recorded operator.
#[derive(Debug, Clone, PartialEq)]
pub enum TracedNode {
    Unsqueeze { dim: usize },
    QuantizePerTensor { params: QuantParams, dtype: QuantDType },
    PackedParams { source: ParamSource, items: Vec<PackedItem> },
    QuantizedConv { op: String, output: QuantParams },
    Dequantize,
}

impl TracedNode {
    /// Qualified operator name.
    pub fn kind(&self) -> &str {
        match self {
            Self::Unsqueeze { .. } => "aten::unsqueeze",
            Self::QuantizePerTensor { .. } => "aten::quantize_per_tensor",
            Self::PackedParams { source, .. } => source.kind(),
            Self::QuantizedConv { op, .. } => op.as_str(),
            Self::Dequantize => "aten::dequantize",
        }
    }
}

/// Straight-line operator graph of a single-operator model.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedGraph {
    rank: ConvRank,
    input_shape: Vec<usize>,
    nodes: Vec<TracedNode>,
}

impl TracedGraph {
    pub fn new(rank: ConvRank, input_shape: Vec<usize>, nodes: Vec<TracedNode>) -> Self {
        Self { rank, input_shape, nodes }
    }

    pub fn rank(&self) -> ConvRank {
        self.rank
    }

    /// Shape of the example input the graph was traced with.
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    pub fn nodes(&self) -> &[TracedNode] {
        &self.nodes
    }

    pub fn op_kinds(&self) -> Vec<&str> {
        self.nodes.iter().map(TracedNode::kind).collect()
    }

    pub fn contains_op(&self, op: &str) -> bool {
        self.nodes.iter().any(|n| n.kind() == op)
    }
}

impl fmt::Display for TracedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph(%x : Float{:?}):", self.input_shape)?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  %{i} = {}", node.kind())?;
        }
        write!(f, "  return (%{})", self.nodes.len().saturating_sub(1))
    }
}

/// Trace `model` on `example`, returning the graph and the traced output.
pub fn trace(
    model: &SynthesizedModel,
    example: &HostTensor,
    freeze: bool,
) -> Result<(TracedGraph, HostTensor)> {
    let conv = model.conv();
    let rank = model.rank();
    let dims = rank.spatial_dims();
    let mut nodes = Vec::with_capacity(5);

    let (_, promoted) = model.promote(example)?;
    if promoted {
        nodes.push(TracedNode::Unsqueeze { dim: 0 });
    }
    nodes.push(TracedNode::QuantizePerTensor {
        params: model.input_params(),
        dtype: QuantDType::QUInt8,
    });

    let (weight, bias) = conv.weight_bias()?;
    let config = conv.config();
    let packed = PackedConvParams {
        weight,
        bias: bias.map(<[f32]>::to_vec),
        stride: config.stride[..dims].to_vec(),
        pads_begin: config.pads_begin[..dims].to_vec(),
        pads_end: config.pads_end[..dims].to_vec(),
        dilation: config.dilation[..dims].to_vec(),
        groups: config.groups,
    };
    let source = if freeze { ParamSource::Constant } else { ParamSource::GetAttr };
    nodes.push(TracedNode::PackedParams { source, items: packed.into_items() });
    nodes.push(TracedNode::QuantizedConv { op: conv.op_name(), output: conv.output_params() });
    nodes.push(TracedNode::Dequantize);

    let output = model.forward(example)?;
    let graph = TracedGraph::new(rank, example.dims().to_vec(), nodes);
    tracing::debug!(ops = ?graph.op_kinds(), freeze, "traced model");
    Ok((graph, output))
}
