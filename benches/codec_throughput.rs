//! Benchmarks for the ILDA and IWP codecs
//!
//! Covers the per-frame work on both sides of the wire:
//! - ILDA decode of a multi-frame show
//! - Frame to wire conversion and datagram packing
//! - IWP parsing of a full datagram

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lasercast::ilda::decode;
use lasercast::iwp::{IwpParser, MAX_DATAGRAM_BYTES, pack};
use lasercast::test_utils::{IldaBuilder, sample_frames};
use lasercast::types::Rgb;
use std::hint::black_box;

fn show_bytes(frames: usize, points: usize) -> Vec<u8> {
    let records: Vec<_> = (0..points)
        .map(|i| (i as i16 * 13, -(i as i16) * 7, 0u8, Rgb::new(i as u8, 255, 64)))
        .collect();
    (0..frames)
        .fold(IldaBuilder::new(), |builder, i| builder.truecolor_2d(&format!("f{i}"), &records))
        .build()
}

fn bench_ilda_decode(c: &mut Criterion) {
    let data = show_bytes(100, 500);

    let mut group = c.benchmark_group("ilda_decode");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("100_frames_500_points", |b| b.iter(|| black_box(decode(black_box(&data)))));
    group.finish();
}

fn bench_frame_pack(c: &mut Criterion) {
    let frames = sample_frames(1);
    let frame = &frames[0];

    let mut group = c.benchmark_group("frame_pack");
    group.throughput(Throughput::Elements(frame.point_count() as u64));
    group.bench_function("to_wire_and_pack", |b| {
        b.iter(|| {
            let points = black_box(frame).to_wire_points();
            black_box(pack(&points, MAX_DATAGRAM_BYTES))
        })
    });
    group.finish();
}

fn bench_iwp_parse(c: &mut Criterion) {
    let frames = sample_frames(1);
    let datagrams = pack(&frames[0].to_wire_points(), MAX_DATAGRAM_BYTES);
    let datagram = &datagrams[0];
    let parser = IwpParser::new();

    let mut group = c.benchmark_group("iwp_parse");
    group.throughput(Throughput::Bytes(datagram.len() as u64));
    group.bench_function("full_datagram", |b| b.iter(|| black_box(parser.parse(black_box(datagram)))));
    group.finish();
}

criterion_group!(benches, bench_ilda_decode, bench_frame_pack, bench_iwp_parse);
criterion_main!(benches);
