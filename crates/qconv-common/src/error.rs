//! Error types shared across the harness

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, QConvError>;

/// Top-level error for every stage of a conformance case.
///
/// The first three variants map onto the failure classes a single case can
/// hit: the module constructor rejected the configuration, the converted
/// graph is missing the expected operator, or the outputs disagree.
#[derive(Debug, Error)]
pub enum QConvError {
    #[error("module construction failed: {0}")]
    Construction(String),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("numerical comparison failed: {0}")]
    Comparison(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("quantization error: {0}")]
    Quantization(#[from] QuantizationError),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the reference convolution kernels
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid kernel arguments: {reason}")]
    InvalidArguments { reason: String },

    #[error("unsupported device: {device}")]
    UnsupportedDevice { device: String },
}

/// Errors raised by affine quantization
#[derive(Debug, Error)]
pub enum QuantizationError {
    #[error("invalid quantization parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("quantization failed: {reason}")]
    QuantizationFailed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_error_converts_into_top_level() {
        let err: QConvError =
            KernelError::InvalidArguments { reason: "groups must be > 0".into() }.into();
        assert!(matches!(err, QConvError::Kernel(_)));
        assert_eq!(err.to_string(), "kernel error: invalid kernel arguments: groups must be > 0");
    }

    #[test]
    fn quantization_error_converts_into_top_level() {
        let err: QConvError =
            QuantizationError::InvalidParams { reason: "scale must be > 0".into() }.into();
        assert!(err.to_string().contains("scale must be > 0"));
    }

    #[test]
    fn construction_message_is_preserved() {
        let err = QConvError::Construction("in_channels must be divisible by groups".into());
        assert_eq!(
            err.to_string(),
            "module construction failed: in_channels must be divisible by groups"
        );
    }
}
