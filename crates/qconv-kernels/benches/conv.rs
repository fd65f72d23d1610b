//! Criterion benchmarks for the reference convolution kernels

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qconv_kernels::{Activation, Conv2dConfig, conv2d_f32, conv2d_quantized};
use qconv_quantization::{QuantDType, QuantParams, QuantizedTensor, quantize_slice};

fn input(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i % 100) as f32 / 100.0).collect()
}

fn configs() -> Vec<(&'static str, Conv2dConfig)> {
    let base = Conv2dConfig::new(3, 2, [3, 3]);
    let mut strided = base.clone();
    strided.stride = [2, 2];
    let mut grouped = Conv2dConfig::new(3, 3, [3, 3]);
    grouped.groups = 3;
    vec![("baseline", base), ("stride2", strided), ("grouped", grouped)]
}

fn bench_conv2d(c: &mut Criterion) {
    let shape = [2, 3, 25, 25];
    let data = input(shape.iter().product());
    let mut group = c.benchmark_group("conv2d");

    for (name, cfg) in configs() {
        let weight = vec![1.0f32; cfg.weight_len()];
        group.bench_with_input(BenchmarkId::new("f32", name), &cfg, |b, cfg| {
            b.iter(|| conv2d_f32(black_box(&data), shape, black_box(&weight), None, cfg))
        });

        let xq = quantize_slice(&data, &shape, QuantParams::unit(), QuantDType::QUInt8)
            .expect("bench input quantizes");
        let wq = QuantizedTensor::new(
            vec![1; cfg.weight_len()],
            vec![cfg.out_channels, cfg.in_channels_per_group(), 3, 3],
            QuantParams::unit(),
            QuantDType::QInt8,
        )
        .expect("bench weight is valid");
        let out = QuantParams::new(0.3, 1).expect("valid params");
        group.bench_with_input(BenchmarkId::new("quantized", name), &cfg, |b, cfg| {
            b.iter(|| {
                conv2d_quantized(
                    black_box(&xq),
                    black_box(&wq),
                    None,
                    cfg,
                    out,
                    QuantDType::QUInt8,
                    Activation::Relu,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_conv2d);
criterion_main!(benches);
