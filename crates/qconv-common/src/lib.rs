//! Common types, errors and configuration for the quantized convolution
//! conformance harness.
//!
//! Every other crate in the workspace builds on the error taxonomy
//! ([`QConvError`]), the harness configuration ([`HarnessConfig`]) and the
//! candle-backed [`HostTensor`] defined here.

pub mod config;
pub mod error;
pub mod tensor;
pub mod types;

pub use config::*;
pub use error::*;
pub use tensor::HostTensor;
pub use types::*;
