//! Queue send/receive throughput benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use fams_common::frame::sensor::SensorBatch;
use fams_shared_memory::{Received, SharedQueue};
use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;

fn bench_name(name: &str) -> String {
    format!("bench_{}_{}", name, std::process::id())
}

/// Benchmark a send immediately followed by a receive on one thread
fn bench_round_trip(c: &mut Criterion) {
    let queue = SharedQueue::create(&bench_name("round_trip"), 1 << 20).unwrap();

    for size in [64usize, 1024, 16 * 1024] {
        let data = vec![0xAAu8; size];
        c.bench_function(&format!("send_receive_{size}_bytes"), |b| {
            b.iter(|| {
                queue.send(black_box(&data)).unwrap();
                black_box(queue.receive().unwrap());
            });
        });
    }
}

/// Benchmark encoded sensor frames flowing from one producer to four consumers
fn bench_competing_consumers(c: &mut Criterion) {
    const FRAMES: usize = 1000;
    let frame = SensorBatch {
        accumulated_time: vec!["2024-05-01 10:00:00".to_string(); 16],
        cistern_code: vec!["C01".to_string(); 16],
        port_type: vec![1; 16],
        value: vec![21.5; 16],
    }
    .encode()
    .unwrap();

    c.bench_function("sensor_frames_1_producer_4_consumers", |b| {
        b.iter(|| {
            let queue = Arc::new(SharedQueue::create(&bench_name("competing"), 64 * 1024).unwrap());
            let barrier = Arc::new(Barrier::new(5));
            let consumers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let mut received = 0usize;
                        while let Ok(Received::Message(bytes)) = queue.receive() {
                            received += black_box(bytes.len());
                        }
                        received
                    })
                })
                .collect();

            barrier.wait();
            for _ in 0..FRAMES {
                queue.send(&frame).unwrap();
            }
            while queue.message_count() > 0 {
                thread::yield_now();
            }
            queue.signal_end().unwrap();

            let total: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(total, FRAMES * frame.len());
            queue.release().unwrap();
        });
    });
}

criterion_group!(benches, bench_round_trip, bench_competing_consumers);
criterion_main!(benches);
