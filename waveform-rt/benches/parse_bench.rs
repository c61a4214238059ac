// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use waveform_rt::wire::VitaPacket;

fn criterion_benchmark(c: &mut Criterion) {
    let mut audio = VitaPacket::new_audio(0xCAFE_0001, 0x1234, vec![(0.5, -0.5); 180]);
    let audio_bytes = audio.encode();

    let mut byte = VitaPacket::new_byte(0xCAFE_0003, 0x1234, vec![0xAA; 512]);
    let byte_bytes = byte.encode();

    c.bench_function("parse audio packet", |p| {
        p.iter(|| VitaPacket::parse(black_box(&audio_bytes), 0x1234).unwrap())
    });
    c.bench_function("parse byte packet", |p| {
        p.iter(|| VitaPacket::parse(black_box(&byte_bytes), 0x1234).unwrap())
    });
    c.bench_function("encode audio packet", |p| p.iter(|| black_box(&mut audio).encode()));
    c.bench_function("encode byte packet", |p| p.iter(|| black_box(&mut byte).encode()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
