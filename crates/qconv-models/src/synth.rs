//! Single-operator model synthesis

use crate::model::SynthesizedModel;
use crate::module::{BiasSource, ConvModuleSpec, ConvVariant, DEFAULT_WEIGHT_SEED};
use crate::structure::ConvStructure;
use qconv_common::Result;

/// Separate reference network. Uninhabited: the synthesized model is its own reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceNet {}

/// A synthesized model plus what the oracle needs to know about it.
#[derive(Debug, Clone)]
pub struct SynthesizedCase {
    pub model: SynthesizedModel,
    pub reference: Option<ReferenceNet>,
    /// Operator the converted graph must contain, e.g. `quantized::conv1d_relu`.
    pub op_name: String,
}

/// Build the single-operator model for one case.
///
/// Constructor rejections (channel / group mismatch, zero sizes, rank mismatch)
/// come back unchanged as `QConvError::Construction`.
pub fn synthesize(
    structure: &ConvStructure,
    bias: bool,
    relu: bool,
    scale: f32,
    zero_point: i32,
    bias_source: BiasSource,
) -> Result<SynthesizedCase> {
    let rank = structure.rank()?;
    let variant = ConvVariant::from_relu(relu);

    let conv = variant.construct(ConvModuleSpec {
        in_channels: structure.in_channels(),
        out_channels: structure.out_channels(),
        kernel_size: structure.kernel_shape().to_vec(),
        stride: structure.stride,
        padding: structure.padding,
        dilation: structure.dilation,
        groups: structure.groups,
        bias,
        bias_source,
        scale,
        zero_point,
        weight_seed: DEFAULT_WEIGHT_SEED,
    })?;

    tracing::debug!(%structure, bias, relu, scale, zero_point, module = %conv, "synthesized model");

    Ok(SynthesizedCase {
        model: SynthesizedModel::new(conv),
        reference: None,
        op_name: variant.op_name(rank),
    })
}
