//! Elementwise output comparison

use crate::tolerance::Tolerance;
use qconv_common::{HostTensor, QConvError, Result};
use qconv_quantization::utils::{calculate_mse, max_abs_diff};
use serde::{Deserialize, Serialize};

/// Summary of one reference / converted comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub shape: Vec<usize>,
    pub max_abs_diff: f32,
    pub mse: f32,
    /// Elements outside tolerance.
    pub mismatches: usize,
    /// Flat index of the first element outside tolerance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_mismatch: Option<usize>,
}

impl ComparisonReport {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Measure `converted` against `reference` without failing on mismatch.
pub fn measure(
    reference: &HostTensor,
    converted: &HostTensor,
    tolerance: &Tolerance,
) -> Result<ComparisonReport> {
    if reference.dims() != converted.dims() {
        return Err(QConvError::Comparison(format!(
            "output shape mismatch: reference={:?}, converted={:?}",
            reference.dims(),
            converted.dims()
        )));
    }
    let expected = reference.to_vec()?;
    let actual = converted.to_vec()?;

    let mut mismatches = 0;
    let mut first_mismatch = None;
    for (i, (&a, &e)) in actual.iter().zip(&expected).enumerate() {
        if !tolerance.allows(a, e) {
            mismatches += 1;
            first_mismatch.get_or_insert(i);
        }
    }

    Ok(ComparisonReport {
        shape: reference.dims().to_vec(),
        max_abs_diff: max_abs_diff(&actual, &expected)?,
        mse: calculate_mse(&actual, &expected)?,
        mismatches,
        first_mismatch,
    })
}

/// Compare outputs, failing with `QConvError::Comparison` outside tolerance.
pub fn compare_outputs(
    reference: &HostTensor,
    converted: &HostTensor,
    tolerance: &Tolerance,
) -> Result<ComparisonReport> {
    let report = measure(reference, converted, tolerance)?;
    if let Some(i) = report.first_mismatch {
        let expected = reference.to_vec()?[i];
        let actual = converted.to_vec()?[i];
        return Err(QConvError::Comparison(format!(
            "{} of {} elements outside tolerance (atol={}, rtol={}); first at {i}: \
             reference={expected}, converted={actual}; max_abs_diff={}",
            report.mismatches,
            reference.elem_count(),
            tolerance.atol,
            tolerance.rtol,
            report.max_abs_diff
        )));
    }
    Ok(report)
}
