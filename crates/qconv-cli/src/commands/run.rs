use super::{CaseSelection, parse_platform, parse_precision};
use anyhow::{Context, Result};
use clap::Args;
use console::style;
use qconv_common::{HarnessConfig, Precision};
use qconv_crossval::{
    LayerTest, LoopbackBackend, LoopbackFrontend, ParameterSpace, RankFixture, SweepReceipt,
    SweepReport, TargetSpec, run_sweep,
};
use qconv_testing_policy::{CaseOutcome, Platform};
use std::path::PathBuf;

/// Run the conformance sweep through the loopback conversion pipeline
#[derive(Args, Debug, Clone, Default)]
pub struct RunCommand {
    #[command(flatten)]
    pub selection: CaseSelection,

    /// Target device (overrides config)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// FP32 or FP16 (overrides config)
    #[arg(long, value_parser = parse_precision)]
    pub precision: Option<Precision>,

    /// Input seed (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Evaluate expected failures as if running on `<os>/<arch>`
    #[arg(long, value_parser = parse_platform, value_name = "OS/ARCH")]
    pub platform: Option<Platform>,

    /// Directory to write one JSON receipt per rank into
    #[arg(long, alias = "receipt", value_name = "DIR")]
    pub receipt_dir: Option<PathBuf>,

    /// Print only failing cases and the summary
    #[arg(long, short)]
    pub quiet: bool,
}

impl RunCommand {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn resolve_config(&self, mut config: HarnessConfig) -> Result<HarnessConfig> {
        if let Some(device) = &self.device {
            config.target.device = device.clone();
        }
        if let Some(precision) = self.precision {
            config.target.precision = precision;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }

    /// Run every selected rank; returns the reports in rank order.
    pub fn sweep(&self, config: &HarnessConfig) -> Vec<SweepReport> {
        let target = TargetSpec::from(&config.target);
        let platform = self.platform.clone().unwrap_or_else(Platform::current);
        let filter = self.selection.filter();

        self.selection
            .ranks()
            .into_iter()
            .map(|rank| {
                let test = LayerTest::from_config(
                    LoopbackFrontend,
                    LoopbackBackend,
                    RankFixture::new(rank, config.seed),
                    config,
                );
                run_sweep(&ParameterSpace::for_rank(rank), &filter, &test, &target, &platform)
            })
            .collect()
    }

    /// Returns whether every selected case resolved as a non-failure.
    pub fn execute(&self, config: &HarnessConfig) -> Result<bool> {
        let config = self.resolve_config(config.clone())?;
        let reports = self.sweep(&config);

        for report in &reports {
            self.print_report(report);
            if let Some(dir) = &self.receipt_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let path = dir.join(format!("quantized_conv{}.json", report.rank));
                SweepReceipt::from_report(report, config.seed)
                    .write_to_file(&path)
                    .with_context(|| format!("failed to write receipt {}", path.display()))?;
                tracing::info!(path = %path.display(), "receipt written");
            }
        }

        Ok(reports.iter().all(SweepReport::is_success))
    }

    fn print_report(&self, report: &SweepReport) {
        println!(
            "{} quantized conv{} on {} ({})",
            style("==>").bold().cyan(),
            report.rank,
            report.target,
            report.platform
        );
        for result in &report.results {
            let label = match &result.outcome {
                CaseOutcome::Passed => style(result.outcome.label()).green(),
                CaseOutcome::ExpectedFailure { .. } => style(result.outcome.label()).yellow(),
                _ => style(result.outcome.label()).red().bold(),
            };
            if self.quiet && !result.outcome.is_failure() {
                continue;
            }
            match &result.outcome {
                CaseOutcome::Failed { reason } | CaseOutcome::UnexpectedPass { reason } => {
                    println!("  {label:<6} {} : {reason}", result.id);
                }
                _ => println!("  {label:<6} {}", result.id),
            }
        }
        let summary = format!(
            "{} total, {} passed, {} failed, {} xfailed, {} xpassed",
            report.total(),
            report.passed(),
            report.failed(),
            report.expected_failures(),
            report.unexpected_passes()
        );
        if report.is_success() {
            println!("  {}", style(summary).green());
        } else {
            println!("  {}", style(summary).red());
        }
    }
}
