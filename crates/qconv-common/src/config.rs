//! Harness configuration
//!
//! Configuration is layered: defaults, then an optional TOML file, then
//! `QCONV_*` environment overrides. The target triple (device, precision,
//! IR version) mirrors what a layer-test driver receives for every case.

use crate::{Precision, QConvError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Seed of the rank-level input generator.
pub const DEFAULT_INPUT_SEED: u64 = 123;

/// IR version passed to the driver when nothing else is configured.
pub const DEFAULT_IR_VERSION: u32 = 11;

/// Main harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub target: TargetConfig,
    pub seed: u64,
    pub tolerance: ToleranceConfig,
    pub logging: LoggingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            seed: DEFAULT_INPUT_SEED,
            tolerance: ToleranceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Device / precision / IR version a converted model is executed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub device: String,
    pub precision: Precision,
    pub ir_version: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self { device: "CPU".to_string(), precision: Precision::FP32, ir_version: DEFAULT_IR_VERSION }
    }
}

/// Tolerance knobs for the equivalence oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Number of quantization steps the outputs may differ by.
    pub quant_step_factor: f32,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self { quant_step_factor: 1.0 }
    }
}

/// Logging configuration consumed by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "compact".to_string() }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| QConvError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `QCONV_DEVICE`, `QCONV_PRECISION`, `QCONV_IR_VERSION` and
    /// `QCONV_SEED` on top of `self`.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(device) = env::var("QCONV_DEVICE") {
            self.target.device = device;
        }
        if let Ok(precision) = env::var("QCONV_PRECISION") {
            self.target.precision = precision.parse()?;
        }
        if let Ok(ir_version) = env::var("QCONV_IR_VERSION") {
            self.target.ir_version = ir_version
                .parse()
                .map_err(|_| QConvError::Config(format!("invalid QCONV_IR_VERSION: {ir_version}")))?;
        }
        if let Ok(seed) = env::var("QCONV_SEED") {
            self.seed =
                seed.parse().map_err(|_| QConvError::Config(format!("invalid QCONV_SEED: {seed}")))?;
        }
        self.validate()?;
        tracing::debug!(
            device = %self.target.device,
            precision = %self.target.precision,
            ir_version = self.target.ir_version,
            seed = self.seed,
            "harness configuration resolved"
        );
        Ok(self)
    }

    /// Reject configurations the oracle cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.target.device.trim().is_empty() {
            return Err(QConvError::Config("target device must not be empty".into()));
        }
        if !self.tolerance.quant_step_factor.is_finite() || self.tolerance.quant_step_factor <= 0.0 {
            return Err(QConvError::Config(format!(
                "quant_step_factor must be positive and finite, got {}",
                self.tolerance.quant_step_factor
            )));
        }
        Ok(())
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| QConvError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults_match_driver_expectations() {
        let config = HarnessConfig::default();
        assert_eq!(config.target.device, "CPU");
        assert_eq!(config.target.precision, Precision::FP32);
        assert_eq!(config.target.ir_version, DEFAULT_IR_VERSION);
        assert_eq!(config.seed, 123);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial(qconv_env)]
    fn env_overrides_target() {
        temp_env::with_vars(
            [
                ("QCONV_DEVICE", Some("GPU")),
                ("QCONV_PRECISION", Some("fp16")),
                ("QCONV_IR_VERSION", Some("10")),
                ("QCONV_SEED", Some("7")),
            ],
            || {
                let config = HarnessConfig::from_env().unwrap();
                assert_eq!(config.target.device, "GPU");
                assert_eq!(config.target.precision, Precision::FP16);
                assert_eq!(config.target.ir_version, 10);
                assert_eq!(config.seed, 7);
            },
        );
    }

    #[test]
    #[serial(qconv_env)]
    fn env_rejects_garbage_ir_version() {
        temp_env::with_var("QCONV_IR_VERSION", Some("eleven"), || {
            let err = HarnessConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("QCONV_IR_VERSION"));
        });
    }

    #[test]
    fn rejects_non_positive_step_factor() {
        let mut config = HarnessConfig::default();
        config.tolerance.quant_step_factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = 5\n\n[target]\nprecision = \"FP16\"").unwrap();

        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.seed, 5);
        assert_eq!(config.target.precision, Precision::FP16);
        assert_eq!(config.target.device, "CPU");
    }

    #[test]
    fn toml_round_trip() {
        let config = HarnessConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: HarnessConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
