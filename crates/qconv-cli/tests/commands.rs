//! Command behaviour without going through the binary.

use qconv_cli::{CaseSelection, ListCommand, RunCommand};
use qconv_common::{ConvRank, HarnessConfig, Precision};
use qconv_crossval::SweepReceipt;
use qconv_testing_policy::{Platform, TestTier};
use serial_test::serial;
use tempfile::TempDir;

fn selection(rank: ConvRank, params: &str) -> CaseSelection {
    CaseSelection { rank: Some(rank), params: Some(params.into()), ..CaseSelection::default() }
}

#[test]
fn list_expands_both_ranks() {
    let ids = ListCommand::default().case_ids();
    assert_eq!(ids.len(), 216 + 144);
    assert!(ids[0].starts_with("conv2d["));
    assert!(ids.last().unwrap().starts_with("conv1d["));
}

#[test]
fn list_applies_filters() {
    let cmd = ListCommand {
        selection: CaseSelection {
            relu: Some(true),
            scale: Some(0.3),
            ..selection(ConvRank::One, "g3")
        },
        json: false,
    };
    let ids = cmd.case_ids();
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|id| id.contains("relu=true") && id.contains("scale=0.3")));
}

#[test]
fn every_case_is_in_both_tiers() {
    let all = ListCommand::default().case_ids().len();
    for tier in [TestTier::Precommit, TestTier::Nightly] {
        let cmd = ListCommand {
            selection: CaseSelection { tier: Some(tier), ..CaseSelection::default() },
            json: true,
        };
        assert_eq!(cmd.case_ids().len(), all);
    }
}

#[test]
fn cli_overrides_win_over_config() {
    let cmd = RunCommand {
        device: Some("GPU".into()),
        precision: Some(Precision::FP16),
        seed: Some(7),
        ..RunCommand::default()
    };
    let config = cmd.resolve_config(HarnessConfig::default()).unwrap();
    assert_eq!(config.target.device, "GPU");
    assert_eq!(config.target.precision, Precision::FP16);
    assert_eq!(config.seed, 7);
}

#[test]
fn empty_device_is_rejected() {
    let cmd = RunCommand { device: Some("  ".into()), ..RunCommand::default() };
    assert!(cmd.resolve_config(HarnessConfig::default()).is_err());
}

#[test]
#[serial(qconv_env)]
fn env_seed_reaches_the_sweep_unless_overridden() {
    temp_env::with_var("QCONV_SEED", Some("99"), || {
        let config = HarnessConfig::from_env().unwrap();
        let cmd = RunCommand::default();
        assert_eq!(cmd.resolve_config(config.clone()).unwrap().seed, 99);

        let cmd = RunCommand { seed: Some(5), ..RunCommand::default() };
        assert_eq!(cmd.resolve_config(config).unwrap().seed, 5);
    });
}

#[test]
fn run_writes_one_receipt_per_rank() {
    let dir = TempDir::new().unwrap();
    let cmd = RunCommand {
        selection: CaseSelection { scale: Some(1.0), ..selection(ConvRank::Two, "g3") },
        platform: Some(Platform::new("linux", "x86_64")),
        receipt_dir: Some(dir.path().join("receipts")),
        quiet: true,
        ..RunCommand::default()
    };
    assert!(cmd.execute(&HarnessConfig::default()).unwrap());

    let receipt =
        SweepReceipt::read_from_file(&dir.path().join("receipts/quantized_conv2d.json")).unwrap();
    assert_eq!(receipt.rank, ConvRank::Two);
    assert_eq!(receipt.summary.total, 8);
    assert!(receipt.summary.all_passed);
    assert!(!dir.path().join("receipts/quantized_conv1d.json").exists());
}

#[test]
fn marked_platform_turns_passes_into_failures() {
    let cmd = RunCommand {
        selection: CaseSelection { bias: Some(false), ..selection(ConvRank::One, "w1x3x3") },
        platform: Some(Platform::new("macos", "aarch64")),
        quiet: true,
        ..RunCommand::default()
    };
    let reports = cmd.sweep(&HarnessConfig::default());
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].unexpected_passes(), reports[0].total());
    assert!(!cmd.execute(&HarnessConfig::default()).unwrap());
}
