use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rtp_media_bridge::audio::JitterBuffer;
use rtp_media_bridge::protocol::RtpPacket;

fn bench_in_order(c: &mut Criterion) {
    c.bench_function("jitter_put_get_in_order", |b| {
        let buffer = JitterBuffer::new(3);
        let mut seq: u16 = 0;
        b.iter(|| {
            buffer.put(RtpPacket::new(111, seq, 0, 1, vec![0u8; 160]));
            black_box(buffer.get());
            seq = seq.wrapping_add(1);
        })
    });
}

fn bench_reordered(c: &mut Criterion) {
    c.bench_function("jitter_reorder_window_of_8", |b| {
        let buffer = JitterBuffer::new(u16::MAX);
        let mut base: u16 = 0;
        b.iter(|| {
            for offset in [1u16, 0, 3, 2, 5, 4, 7, 6] {
                buffer.put(RtpPacket::new(111, base.wrapping_add(offset), 0, 1, vec![0u8; 160]));
            }
            for _ in 0..8 {
                black_box(buffer.get());
            }
            base = base.wrapping_add(8);
        })
    });
}

fn bench_parse(c: &mut Criterion) {
    let wire = RtpPacket::new(111, 1000, 48000, 0xABCD, vec![0u8; 160]).serialize();
    c.bench_function("rtp_parse_160_byte_payload", |b| {
        b.iter(|| black_box(RtpPacket::parse(black_box(&wire))))
    });
}

criterion_group!(benches, bench_in_order, bench_reordered, bench_parse);
criterion_main!(benches);
