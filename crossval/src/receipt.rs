//! Sweep receipt: structured JSON record of a conformance run
//!
//! ## Schema
//!
//! - **v1**: target, platform, per-case outcome with max abs diff and atol,
//!   aggregate counts

use crate::driver::TargetSpec;
use crate::sweep::SweepReport;
use qconv_common::ConvRank;
use qconv_testing_policy::{CaseOutcome, Platform};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const RECEIPT_SCHEMA_VERSION: u32 = 1;

/// Receipt of one sweep
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SweepReceipt {
    /// Schema version
    pub version: u32,

    /// RFC3339 timestamp when receipt was generated
    pub timestamp: String,

    pub rank: ConvRank,

    pub target: TargetSpec,

    pub platform: Platform,

    /// Input generator seed
    pub seed: u64,

    #[serde(default)]
    pub cases: Vec<CaseReceipt>,

    #[serde(default)]
    pub summary: ReceiptSummary,
}

/// Per-case row
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CaseReceipt {
    pub id: String,

    pub outcome: CaseOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_abs_diff: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub atol: Option<f32>,
}

/// Aggregate counts
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub expected_failures: usize,
    pub unexpected_passes: usize,
    pub all_passed: bool,
}

impl SweepReceipt {
    pub fn from_report(report: &SweepReport, seed: u64) -> Self {
        Self {
            version: RECEIPT_SCHEMA_VERSION,
            timestamp: chrono::Utc::now().to_rfc3339(),
            rank: report.rank,
            target: report.target.clone(),
            platform: report.platform.clone(),
            seed,
            cases: report
                .results
                .iter()
                .map(|r| CaseReceipt {
                    id: r.id.clone(),
                    outcome: r.outcome.clone(),
                    max_abs_diff: r.max_abs_diff,
                    atol: r.atol,
                })
                .collect(),
            summary: ReceiptSummary {
                total: report.total(),
                passed: report.passed(),
                failed: report.failed(),
                expected_failures: report.expected_failures(),
                unexpected_passes: report.unexpected_passes(),
                all_passed: report.is_success(),
            },
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write receipt to file as JSON
    pub fn write_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read_from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
