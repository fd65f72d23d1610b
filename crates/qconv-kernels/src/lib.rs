//! Reference convolution kernels
//!
//! Pure-Rust CPU kernels used both as the framework-side execution of a
//! quantized convolution module and as the float execution of a lowered
//! program. 1-D convolution is expressed as 2-D convolution over a trailing
//! singleton axis.

pub mod cpu;

pub use cpu::conv::{Conv1dConfig, Conv2dConfig, compute_output_size, conv2d_f32};
pub use cpu::quantized::{Activation, conv2d_quantized};
