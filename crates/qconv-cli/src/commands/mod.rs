//! Subcommands

mod list;
mod run;

pub use list::ListCommand;
pub use run::RunCommand;

use clap::Args;
use qconv_common::{ConvRank, Precision, QConvError};
use qconv_crossval::CaseFilter;
use qconv_testing_policy::{Platform, TestTier};

/// Case selection shared by `list` and `run`.
#[derive(Args, Debug, Clone, Default)]
pub struct CaseSelection {
    /// Rank to select (1d or 2d); both when omitted
    #[arg(long, value_parser = parse_rank)]
    pub rank: Option<ConvRank>,

    /// Substring of the structure label, e.g. `g3` or `p0x1`
    #[arg(long, value_name = "PATTERN")]
    pub params: Option<String>,

    #[arg(long)]
    pub bias: Option<bool>,

    #[arg(long)]
    pub relu: Option<bool>,

    #[arg(long)]
    pub scale: Option<f32>,

    #[arg(long, value_name = "ZP")]
    pub zero_point: Option<i32>,

    /// precommit or nightly
    #[arg(long, value_parser = parse_tier)]
    pub tier: Option<TestTier>,
}

impl CaseSelection {
    pub fn ranks(&self) -> Vec<ConvRank> {
        match self.rank {
            Some(rank) => vec![rank],
            None => vec![ConvRank::Two, ConvRank::One],
        }
    }

    pub fn filter(&self) -> CaseFilter {
        CaseFilter {
            params: self.params.clone(),
            bias: self.bias,
            relu: self.relu,
            scale: self.scale,
            zero_point: self.zero_point,
            tier: self.tier,
        }
    }
}

fn parse_rank(s: &str) -> Result<ConvRank, String> {
    s.parse().map_err(|e: QConvError| e.to_string())
}

fn parse_tier(s: &str) -> Result<TestTier, String> {
    s.parse().map_err(|e: QConvError| e.to_string())
}

pub(crate) fn parse_precision(s: &str) -> Result<Precision, String> {
    s.parse().map_err(|e: QConvError| e.to_string())
}

/// `os/arch`, e.g. `macos/aarch64`.
pub(crate) fn parse_platform(s: &str) -> Result<Platform, String> {
    match s.split_once('/') {
        Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Platform::new(os, arch)),
        _ => Err(format!("expected <os>/<arch>, got '{s}'")),
    }
}
