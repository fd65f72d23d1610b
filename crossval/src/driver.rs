//! Equivalence oracle: trace, convert, execute, compare
//!
//! The conversion frontend and execution backend are collaborators behind
//! traits. [`LayerTest::run`] drives one synthesized case through them:
//!
//! 1. draw the case input from the rank fixture
//! 2. run the framework model for the reference output
//! 3. trace the model (unfrozen by default)
//! 4. convert the trace; the expected operator must be in the trace and
//!    reported as translated by the frontend
//! 5. execute the converted model on the target device
//! 6. compare under [`Tolerance::for_run`]

use crate::compare::{ComparisonReport, compare_outputs};
use crate::fixture::RankFixture;
use crate::tolerance::{DEFAULT_QUANT_STEP_FACTOR, Tolerance};
use qconv_common::{HarnessConfig, HostTensor, Precision, QConvError, Result, TargetConfig};
use qconv_models::{SynthesizedCase, TracedGraph, trace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device, precision and IR version a converted model runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub device: String,
    pub precision: Precision,
    pub ir_version: u32,
}

impl TargetSpec {
    pub fn cpu(precision: Precision) -> Self {
        Self::from(&TargetConfig { precision, ..TargetConfig::default() })
    }
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self::from(&TargetConfig::default())
    }
}

impl From<&TargetConfig> for TargetSpec {
    fn from(cfg: &TargetConfig) -> Self {
        Self { device: cfg.device.clone(), precision: cfg.precision, ir_version: cfg.ir_version }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/ir{}", self.device, self.precision, self.ir_version)
    }
}

/// Per-run driver flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunFlags {
    pub trace_model: bool,
    pub freeze_model: bool,
    pub quantized_ops: bool,
    /// Output quantization step the tolerance is scaled by.
    pub quant_size: f32,
}

impl RunFlags {
    /// Traced, unfrozen, quantized run with the given output scale.
    pub fn quantized(scale: f32) -> Self {
        Self { trace_model: true, freeze_model: false, quantized_ops: true, quant_size: scale }
    }
}

/// Converts a traced graph into an executable model.
pub trait ConversionFrontend {
    type Model: ConvertedModel;

    fn name(&self) -> &str;

    fn convert(&self, graph: &TracedGraph) -> Result<Self::Model>;
}

/// Output of a conversion.
pub trait ConvertedModel {
    /// Source operators the frontend translated, in graph order.
    fn translated_ops(&self) -> &[String];

    fn has_translated(&self, op: &str) -> bool {
        self.translated_ops().iter().any(|o| o == op)
    }
}

/// Runs converted models.
pub trait ExecutionBackend<M: ConvertedModel> {
    fn name(&self) -> &str;

    fn execute(&self, model: &M, input: &HostTensor, target: &TargetSpec) -> Result<HostTensor>;
}

/// Result of one successful case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub op_name: String,
    pub traced_ops: Vec<String>,
    pub tolerance: Tolerance,
    pub comparison: ComparisonReport,
}

/// Drives cases of one rank through a frontend / backend pair.
#[derive(Debug, Clone)]
pub struct LayerTest<F, B> {
    frontend: F,
    backend: B,
    fixture: RankFixture,
    quant_step_factor: f32,
}

impl<F, B> LayerTest<F, B>
where
    F: ConversionFrontend,
    B: ExecutionBackend<F::Model>,
{
    pub fn new(frontend: F, backend: B, fixture: RankFixture) -> Self {
        Self { frontend, backend, fixture, quant_step_factor: DEFAULT_QUANT_STEP_FACTOR }
    }

    /// Build from harness configuration (seed and tolerance factor).
    pub fn from_config(frontend: F, backend: B, fixture: RankFixture, config: &HarnessConfig) -> Self {
        let fixture = RankFixture::new(fixture.rank(), config.seed).with_shape(fixture.shape().to_vec());
        Self { frontend, backend, fixture, quant_step_factor: config.tolerance.quant_step_factor }
    }

    pub fn fixture(&self) -> &RankFixture {
        &self.fixture
    }

    pub fn tolerance(&self, flags: &RunFlags, precision: Precision) -> Tolerance {
        Tolerance::with_step_factor(flags, precision, self.quant_step_factor)
    }

    pub fn run(&self, case: &SynthesizedCase, target: &TargetSpec, flags: &RunFlags) -> Result<RunReport> {
        let input = self.fixture.next_input()?;

        let reference = case.model.forward(&input)?;
        tracing::debug!(op = %case.op_name, shape = ?reference.dims(), "reference output");

        if !flags.trace_model {
            return Err(QConvError::Conversion(format!(
                "{} converts traced graphs only",
                self.frontend.name()
            )));
        }
        let (graph, _) = trace(&case.model, &input, flags.freeze_model)?;
        if !graph.contains_op(&case.op_name) {
            return Err(QConvError::Conversion(format!(
                "traced graph does not contain {}: {:?}",
                case.op_name,
                graph.op_kinds()
            )));
        }

        let converted = self.frontend.convert(&graph)?;
        if !converted.has_translated(&case.op_name) {
            return Err(QConvError::Conversion(format!(
                "{} did not translate {}",
                self.frontend.name(),
                case.op_name
            )));
        }
        tracing::debug!(frontend = self.frontend.name(), ops = ?converted.translated_ops(), "converted");

        let output = self.backend.execute(&converted, &input, target)?;
        tracing::debug!(backend = self.backend.name(), %target, "executed");

        let tolerance = self.tolerance(flags, target.precision);
        let comparison = compare_outputs(&reference, &output, &tolerance)?;

        Ok(RunReport {
            op_name: case.op_name.clone(),
            traced_ops: graph.op_kinds().into_iter().map(String::from).collect(),
            tolerance,
            comparison,
        })
    }
}
