//! Sweep runner: every case of a rank through one layer test

use crate::driver::{ConversionFrontend, ExecutionBackend, LayerTest, RunFlags, TargetSpec};
use crate::params::{CaseFilter, ParameterSpace};
use qconv_common::ConvRank;
use qconv_models::BiasSource;
use qconv_testing_policy::{CaseOutcome, Platform, resolve};
use serde::{Deserialize, Serialize};

/// Outcome of one case plus the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub op_name: Option<String>,
    pub outcome: CaseOutcome,
    pub max_abs_diff: Option<f32>,
    pub atol: Option<f32>,
}

/// Aggregated results of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub rank: ConvRank,
    pub target: TargetSpec,
    pub platform: Platform,
    pub results: Vec<CaseResult>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    fn count(&self, f: impl Fn(&CaseOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| f(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::Failed { .. }))
    }

    pub fn expected_failures(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::ExpectedFailure { .. }))
    }

    pub fn unexpected_passes(&self) -> usize {
        self.count(|o| matches!(o, CaseOutcome::UnexpectedPass { .. }))
    }

    /// No case counts as a failure.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| !r.outcome.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }
}

/// Run every case of `space` selected by `filter`.
///
/// Failures of individual cases are recorded, never propagated.
pub fn run_sweep<F, B>(
    space: &ParameterSpace,
    filter: &CaseFilter,
    layer_test: &LayerTest<F, B>,
    target: &TargetSpec,
    platform: &Platform,
) -> SweepReport
where
    F: ConversionFrontend,
    B: ExecutionBackend<F::Model>,
{
    let cases = space.filtered(filter);
    tracing::info!(rank = %space.rank, cases = cases.len(), %target, %platform, "starting sweep");

    let results = cases
        .iter()
        .map(|params| {
            let id = params.id();
            let flags = RunFlags::quantized(params.scale);
            let run = params
                .synthesize(BiasSource::Random)
                .and_then(|case| layer_test.run(&case, target, &flags));
            let outcome = resolve(&run, &params.marks, platform);
            match &outcome {
                CaseOutcome::Passed => tracing::debug!(%id, "passed"),
                other => tracing::warn!(%id, outcome = %other, "case did not pass"),
            }
            let report = run.ok();
            CaseResult {
                id,
                op_name: report.as_ref().map(|r| r.op_name.clone()),
                outcome,
                max_abs_diff: report.as_ref().map(|r| r.comparison.max_abs_diff),
                atol: report.as_ref().map(|r| r.tolerance.atol),
            }
        })
        .collect();

    let report = SweepReport {
        rank: space.rank,
        target: target.clone(),
        platform: platform.clone(),
        results,
    };
    tracing::info!(
        rank = %report.rank,
        total = report.total(),
        passed = report.passed(),
        failed = report.failed(),
        xfailed = report.expected_failures(),
        xpassed = report.unexpected_passes(),
        "sweep finished"
    );
    report
}
