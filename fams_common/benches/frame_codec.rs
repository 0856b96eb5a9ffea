//! Frame encode/decode benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use fams_common::frame::sensor::SensorBatch;
use fams_common::frame::{DecodedFrame, decode};
use std::hint::black_box;

fn sensor_batch(samples: usize) -> SensorBatch {
    SensorBatch {
        accumulated_time: (0..samples)
            .map(|i| format!("2024-05-01 10:{:02}:{:02}", i / 60 % 60, i % 60))
            .collect(),
        cistern_code: (0..samples).map(|i| format!("C{:03}", i % 100)).collect(),
        port_type: (0..samples).map(|i| (i % 17) as i32 + 1).collect(),
        value: (0..samples).map(|i| i as f64 * 0.25).collect(),
    }
}

/// Benchmark encoding of sensor batches of different sizes
fn bench_encode(c: &mut Criterion) {
    for samples in [1usize, 64, 1024] {
        let batch = sensor_batch(samples);
        c.bench_function(&format!("encode_sensor_{samples}"), |b| {
            b.iter(|| black_box(batch.encode().unwrap()));
        });
    }
}

/// Benchmark decoding plus a full pass over every section
fn bench_decode(c: &mut Criterion) {
    for samples in [1usize, 64, 1024] {
        let bytes = sensor_batch(samples).encode().unwrap();
        c.bench_function(&format!("decode_sensor_{samples}"), |b| {
            b.iter(|| {
                if let Ok(DecodedFrame::Sensor(frame)) = decode(black_box(&bytes)) {
                    let sum: f64 = frame.value().sum();
                    let codes = frame.cistern_code().filter(|c| !c.is_empty()).count();
                    black_box((sum, codes));
                }
            });
        });
    }
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
