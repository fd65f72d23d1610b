//! End-to-end conformance of quantized 2-D convolution through the loopback pipeline.

use qconv_common::{Precision, QConvError};
use qconv_crossval::{
    CaseFilter, LayerTest, LoopbackBackend, LoopbackFrontend, ParameterSpace, RankFixture, RunFlags,
    TargetSpec, run_sweep,
};
use qconv_models::{BiasSource, ConvStructure, Padding, synthesize};
use qconv_testing_policy::Platform;

fn layer_test() -> LayerTest<LoopbackFrontend, LoopbackBackend> {
    LayerTest::new(LoopbackFrontend, LoopbackBackend, RankFixture::conv2d())
}

#[test]
fn baseline_two_output_channels() {
    let s = ConvStructure::new([2, 3, 3, 3]);
    let case = synthesize(&s, false, false, 1.0, 0, BiasSource::Random).unwrap();
    assert_eq!(case.op_name, "quantized::conv2d");

    let report = layer_test()
        .run(&case, &TargetSpec::default(), &RunFlags::quantized(1.0))
        .unwrap();
    assert_eq!(report.comparison.shape, vec![2, 2, 23, 23]);
    assert!(report.comparison.passed());
    assert!(report.traced_ops.iter().any(|op| op == "quantized::conv2d"));
}

#[test]
fn asymmetric_padding_case() {
    let s = ConvStructure::new([2, 3, 3, 3])
        .with_padding(Padding::Asymmetric { begin: (1, 0), end: (0, 1) });
    let case = synthesize(&s, true, true, 0.3, 1, BiasSource::Random).unwrap();
    let report = layer_test()
        .run(&case, &TargetSpec::default(), &RunFlags::quantized(0.3))
        .unwrap();
    assert_eq!(report.comparison.shape, vec![2, 2, 24, 24]);
}

#[test]
fn full_sweep_passes_off_marked_platform() {
    let report = run_sweep(
        &ParameterSpace::conv2d(),
        &CaseFilter::default(),
        &layer_test(),
        &TargetSpec::default(),
        &Platform::new("linux", "x86_64"),
    );
    assert_eq!(report.total(), 216);
    let failures: Vec<_> = report.failures().map(|r| r.id.clone()).collect();
    assert!(failures.is_empty(), "{failures:?}");
    assert!(report.is_success());
}

#[test]
fn passing_sweep_on_marked_platform_is_all_unexpected_passes() {
    let filter = CaseFilter { params: Some("g3".into()), ..CaseFilter::default() };
    let report = run_sweep(
        &ParameterSpace::conv2d(),
        &filter,
        &layer_test(),
        &TargetSpec::default(),
        &Platform::new("macos", "aarch64"),
    );
    assert_eq!(report.total(), 24);
    assert_eq!(report.unexpected_passes(), 24);
    assert!(!report.is_success());
}

#[test]
fn full_sweep_fp16() {
    let report = run_sweep(
        &ParameterSpace::conv2d(),
        &CaseFilter::default(),
        &layer_test(),
        &TargetSpec::cpu(Precision::FP16),
        &Platform::new("linux", "x86_64"),
    );
    assert_eq!(report.total(), 216);
    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn unsupported_device_fails_the_case() {
    let case = synthesize(&ConvStructure::new([1, 3, 3, 3]), false, false, 1.0, 0, BiasSource::Random)
        .unwrap();
    let target = TargetSpec { device: "GPU".into(), ..TargetSpec::default() };
    let err = layer_test().run(&case, &target, &RunFlags::quantized(1.0)).unwrap_err();
    assert!(matches!(err, QConvError::Kernel(_)));
}

#[test]
fn frozen_trace_is_a_conversion_error() {
    let case = synthesize(&ConvStructure::new([1, 3, 3, 3]), false, false, 1.0, 0, BiasSource::Random)
        .unwrap();
    let flags = RunFlags { freeze_model: true, ..RunFlags::quantized(1.0) };
    let err = layer_test().run(&case, &TargetSpec::default(), &flags).unwrap_err();
    assert!(matches!(err, QConvError::Conversion(_)));
}
