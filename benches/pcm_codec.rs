use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lingo::audio::convert::resample;
use lingo::audio::decoder::{decode_base64, decode_pcm16};
use lingo::audio::encoder::{create_pcm_blob, encode_pcm16};
use std::hint::black_box;

/// A 440 Hz tone, `len` samples at 16 kHz.
fn tone(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 16000.0).sin() * 0.5)
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for len in [1024usize, 4096, 16384] {
        let samples = tone(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("pcm16", len), &samples, |b, s| {
            b.iter(|| encode_pcm16(black_box(s)))
        });
        group.bench_with_input(BenchmarkId::new("blob", len), &samples, |b, s| {
            b.iter(|| create_pcm_blob(black_box(s)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    // Typical response chunk sizes at 24 kHz.
    for len in [960usize, 4800, 24000] {
        let bytes = encode_pcm16(&tone(len));
        let encoded = STANDARD.encode(&bytes);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("pcm16", len), &bytes, |b, data| {
            b.iter(|| decode_pcm16(black_box(data), 24000, 1))
        });
        group.bench_with_input(BenchmarkId::new("base64+pcm16", len), &encoded, |b, data| {
            b.iter(|| {
                let raw = decode_base64(black_box(data)).ok()?;
                decode_pcm16(&raw, 24000, 1).ok()
            })
        });
    }
    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let samples = tone(24000);
    c.bench_function("resample 24k->48k 1s", |b| {
        b.iter(|| resample(black_box(&samples), 24000, 48000))
    });
    c.bench_function("resample 48k->16k 1s", |b| {
        let input = tone(48000);
        b.iter(|| resample(black_box(&input), 48000, 16000))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_resample);
criterion_main!(benches);
