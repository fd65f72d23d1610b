//! Quantized convolution modules and single-operator models
//!
//! - [`structure`]: structural configuration of a convolution case
//! - [`module`]: immutable quantized convolution modules (`Conv{1,2}d`, `ConvReLU{1,2}d`)
//! - [`model`]: the quantize → conv → dequantize wrapper model
//! - [`synth`]: builds a model and its expected operator name from case parameters
//! - [`trace`]: records the operator graph a model executes

pub mod model;
pub mod module;
pub mod structure;
pub mod synth;
pub mod trace;

pub use model::SynthesizedModel;
pub use module::{BiasSource, ConvModuleSpec, ConvVariant, DEFAULT_WEIGHT_SEED, QuantizedConv};
pub use structure::{ConvStructure, Extent, Padding};
pub use synth::{ReferenceNet, SynthesizedCase, synthesize};
pub use trace::{PackedConvParams, PackedItem, ParamSource, TracedGraph, TracedNode, trace};
