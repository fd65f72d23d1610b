//! Conformance harness for quantized convolution conversion
//!
//! For every case of a rank's parameter space the harness synthesizes a
//! single-operator model, traces it, converts it with a
//! [`ConversionFrontend`], executes the result with an [`ExecutionBackend`]
//! and compares against the framework output under a quantization-aware
//! [`Tolerance`].
//!
//! The [`loopback`] frontend / backend pair lowers traced graphs onto the
//! reference float kernels so the protocol can run without an external
//! conversion stack.

pub mod compare;
pub mod driver;
pub mod fixture;
pub mod loopback;
pub mod params;
pub mod receipt;
pub mod sweep;
pub mod tolerance;

pub use compare::{ComparisonReport, compare_outputs};
pub use driver::{
    ConversionFrontend, ConvertedModel, ExecutionBackend, LayerTest, RunFlags, RunReport, TargetSpec,
};
pub use fixture::RankFixture;
pub use loopback::{LoopbackBackend, LoopbackFrontend, LoweredOp, LoweredProgram};
pub use params::{CaseFilter, CaseParams, ParameterSpace, conv1d_structures, conv2d_structures};
pub use receipt::{CaseReceipt, ReceiptSummary, SweepReceipt};
pub use sweep::{CaseResult, SweepReport, run_sweep};
pub use tolerance::Tolerance;
