//! End-to-end conformance of quantized 1-D convolution through the loopback pipeline.

use qconv_common::{Precision, QConvError};
use qconv_crossval::{
    CaseFilter, LayerTest, LoopbackBackend, LoopbackFrontend, ParameterSpace, RankFixture, RunFlags,
    TargetSpec, Tolerance, run_sweep,
};
use qconv_models::{BiasSource, ConvStructure, synthesize};
use qconv_testing_policy::Platform;

fn layer_test(fixture: RankFixture) -> LayerTest<LoopbackFrontend, LoopbackBackend> {
    LayerTest::new(LoopbackFrontend, LoopbackBackend, fixture)
}

#[test]
fn grouped_relu_with_bias() {
    let s = ConvStructure::new([3, 1, 3]).with_groups(3);
    let case = synthesize(&s, true, true, 0.3, 1, BiasSource::Random).unwrap();
    assert_eq!(case.op_name, "quantized::conv1d_relu");

    let report = layer_test(RankFixture::conv1d())
        .run(&case, &TargetSpec::default(), &RunFlags::quantized(0.3))
        .unwrap();
    assert_eq!(report.comparison.shape, vec![2, 3, 48]);

    let coarse = Tolerance::for_run(&RunFlags::quantized(1.3), TargetSpec::default().precision);
    assert!(report.tolerance.atol < coarse.atol);
}

#[test]
fn unbatched_input_is_promoted() {
    let case = synthesize(&ConvStructure::new([2, 3, 3]), true, false, 1.3, 0, BiasSource::Random)
        .unwrap();
    let report = layer_test(RankFixture::conv1d().with_shape([3, 50]))
        .run(&case, &TargetSpec::default(), &RunFlags::quantized(1.3))
        .unwrap();
    assert_eq!(report.comparison.shape, vec![1, 2, 48]);
    assert_eq!(report.traced_ops[0], "aten::unsqueeze");
}

#[test]
fn full_sweep_passes_off_marked_platform() {
    let report = run_sweep(
        &ParameterSpace::conv1d(),
        &CaseFilter::default(),
        &layer_test(RankFixture::conv1d()),
        &TargetSpec::default(),
        &Platform::new("linux", "x86_64"),
    );
    assert_eq!(report.total(), 144);
    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
    assert!(report.results.iter().all(|r| r.max_abs_diff.is_some()));
}

#[test]
fn full_sweep_fp16() {
    let report = run_sweep(
        &ParameterSpace::conv1d(),
        &CaseFilter::default(),
        &layer_test(RankFixture::conv1d()),
        &TargetSpec::cpu(Precision::FP16),
        &Platform::new("linux", "x86_64"),
    );
    assert_eq!(report.total(), 144);
    assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
}

#[test]
fn group_mismatch_fails_at_synthesis() {
    let s = ConvStructure::new([2, 1, 3]).with_groups(3);
    let err = synthesize(&s, false, false, 1.0, 0, BiasSource::Random).unwrap_err();
    assert!(matches!(err, QConvError::Construction(_)));
}

#[test]
fn relu_flag_selects_operator() {
    for relu in [false, true] {
        let case = synthesize(&ConvStructure::new([2, 3, 3]), false, relu, 1.0, 0, BiasSource::Random)
            .unwrap();
        let expected = if relu { "quantized::conv1d_relu" } else { "quantized::conv1d" };
        assert_eq!(case.op_name, expected);
        assert_eq!(case.model.conv().variant().is_relu(), relu);
    }
}
