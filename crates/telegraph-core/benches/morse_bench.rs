//! Criterion benchmarks for the morse lookup and the keying hot path.
//!
//! The decoder polls every 10ms and calls the lookup while other tasks wait
//! on the keying lock, so both must stay far below a millisecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package telegraph-core --bench morse_bench
//! ```

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use telegraph_core::{scan_latest_state, InternationalMorse, KeyingState, MorseLookup, TimingConfig};

/// Benchmarks `decode` for a single code, a short word, and an unknown code.
fn bench_decode(c: &mut Criterion) {
    let table = InternationalMorse::new();
    let inputs: &[(&str, &str)] = &[
        ("E", "."),
        ("0", "-----"),
        ("SOS", "... --- ..."),
        ("PARIS", ".--. .- .-. .. ..."),
        ("unknown", "........"),
    ];

    let mut group = c.benchmark_group("morse_decode");
    for (name, code) in inputs {
        group.bench_with_input(BenchmarkId::new("code", name), code, |b, code| {
            b.iter(|| table.decode(black_box(code)))
        });
    }
    group.finish();
}

/// Benchmarks `encode` across the whole alphabet.
fn bench_encode(c: &mut Criterion) {
    let table = InternationalMorse::new();
    c.bench_function("morse_encode_alphabet", |b| {
        b.iter(|| {
            for ch in 'A'..='Z' {
                black_box(table.encode(black_box(ch)));
            }
        })
    });
}

/// Benchmarks one press/release/poll cycle, the work done under the keying lock.
fn bench_keying_cycle(c: &mut Criterion) {
    let timing = TimingConfig::default();
    c.bench_function("keying_press_release_poll", |b| {
        let t0 = Instant::now();
        b.iter(|| {
            let mut state = KeyingState::new(timing);
            state.press(t0);
            state.release(t0 + Duration::from_millis(100));
            black_box(state.poll(t0 + Duration::from_millis(2000)))
        })
    });
}

/// Benchmarks scanning a coalesced 4 KiB read.
fn bench_scan(c: &mut Criterion) {
    let chunk: Vec<u8> = (0..4096).map(|i| if i % 2 == 0 { b'1' } else { b'0' }).collect();
    c.bench_function("scan_latest_state_4k", |b| {
        b.iter(|| scan_latest_state(black_box(&chunk)))
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_keying_cycle, bench_scan);
criterion_main!(benches);
