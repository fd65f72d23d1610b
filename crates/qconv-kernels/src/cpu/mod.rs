//! CPU kernel implementations

pub mod conv;
pub mod quantized;
