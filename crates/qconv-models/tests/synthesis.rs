//! Integration tests for model synthesis across ranks and groupings.

use proptest::prelude::*;
use qconv_common::{HostTensor, QConvError};
use qconv_models::{BiasSource, ConvStructure, Extent, Padding, synthesize};

fn input(shape: &[usize]) -> HostTensor {
    let n: usize = shape.iter().product();
    let data = (0..n).map(|v| ((v * 31) % 97) as f32 / 97.0).collect();
    HostTensor::from_vec(data, shape).unwrap()
}

#[test]
fn grouped_and_dense_outputs_share_shape() {
    let dense = ConvStructure::new([3, 3, 3, 3]);
    let grouped = ConvStructure::new([3, 1, 3, 3]).with_groups(3);
    let x = input(&[2, 3, 25, 25]);
    let a = synthesize(&dense, false, false, 1.0, 0, BiasSource::Random).unwrap();
    let b = synthesize(&grouped, false, false, 1.0, 0, BiasSource::Random).unwrap();
    assert_eq!(a.model.forward(&x).unwrap().dims(), b.model.forward(&x).unwrap().dims());
}

#[test]
fn conv1d_matches_conv2d_with_unit_width_kernel() {
    let bias = BiasSource::Fixed(vec![0.5, -0.25]);
    let one = ConvStructure::new([2, 3, 3]).with_stride(Extent::Scalar(2)).with_padding(Padding::Scalar(1));
    let two = ConvStructure::new([2, 3, 3, 1])
        .with_stride(Extent::Pair(2, 1))
        .with_padding(Padding::Pair(1, 0));
    let a = synthesize(&one, true, true, 0.3, 1, bias.clone()).unwrap();
    let b = synthesize(&two, true, true, 0.3, 1, bias).unwrap();

    let x1 = input(&[2, 3, 50]);
    let x2 = x1.unsqueeze(3).unwrap();
    let y1 = a.model.forward(&x1).unwrap();
    let y2 = b.model.forward(&x2).unwrap();
    assert_eq!(y1.dims(), &[2, 2, 25]);
    assert_eq!(y1.to_vec().unwrap(), y2.to_vec().unwrap());
}

#[test]
fn baseline_conv2d_output_shape() {
    let case = synthesize(&ConvStructure::new([2, 3, 3, 3]), false, false, 1.0, 0, BiasSource::Random)
        .unwrap();
    assert_eq!(case.op_name, "quantized::conv2d");
    assert_eq!(case.model.forward(&input(&[2, 3, 25, 25])).unwrap().dims(), &[2, 2, 23, 23]);
}

#[test]
fn asymmetric_padding_output_shape() {
    let s = ConvStructure::new([2, 3, 3, 3])
        .with_padding(Padding::Asymmetric { begin: (1, 0), end: (0, 1) });
    let case = synthesize(&s, false, false, 1.0, 0, BiasSource::Random).unwrap();
    assert_eq!(case.model.forward(&input(&[2, 3, 25, 25])).unwrap().dims(), &[2, 2, 24, 24]);
}

#[test]
fn pair_padding_on_conv1d_is_rejected() {
    let s = ConvStructure::new([2, 3, 3]).with_padding(Padding::Pair(0, 1));
    assert!(matches!(
        synthesize(&s, false, false, 1.0, 0, BiasSource::Random),
        Err(QConvError::Construction(_))
    ));
}

proptest! {
    /// Dequantized outputs are `(q - zp) * scale` for some integer `q >= 0`.
    #[test]
    fn outputs_lie_on_the_quantization_grid(
        scale in prop::sample::select(vec![1.0f32, 0.3, 1.3]),
        zero_point in 0i32..2,
        relu in any::<bool>(),
    ) {
        let case = synthesize(&ConvStructure::new([2, 3, 3]), true, relu, scale, zero_point, BiasSource::Random)
            .unwrap();
        let y = case.model.forward(&input(&[2, 3, 20])).unwrap().to_vec().unwrap();
        for v in y {
            let steps = v / scale;
            prop_assert!((steps - steps.round()).abs() < 1e-3, "{} is off-grid for scale {}", v, scale);
            prop_assert!(steps.round() >= -(zero_point as f32));
        }
    }
}
