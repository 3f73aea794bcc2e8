//! Wire protocol benchmarks.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridwire_protocol::frame::Frame;
use gridwire_protocol::{
    CodecRegistry, Decoder, Encoder, Entry, Message, PutAllRequest, RequestKind, Value,
};

fn create_put_all(entries: usize, codecs: &CodecRegistry) -> Message {
    let entries = (0..entries)
        .map(|i| {
            Entry::new(
                codecs.encode_value(&Value::from(format!("key-{}", i))).unwrap(),
                codecs.encode_value(&Value::from(i as i64)).unwrap(),
            )
        })
        .collect();
    let request = PutAllRequest {
        region_name: "bench".to_string(),
        entries,
    };
    Message::request(1, &request).unwrap()
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let frame = Frame::new(Bytes::from("x".repeat(size)));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let encoded = Frame::new(Bytes::from("x".repeat(size))).encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = BytesMut::from(&encoded[..]);
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_envelope_encode(c: &mut Criterion) {
    let codecs = CodecRegistry::with_defaults();
    let mut group = c.benchmark_group("envelope_encode");

    for entries in [1, 100, 1000] {
        let message = create_put_all(entries, &codecs);

        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(entries),
            &message,
            |b, message| {
                b.iter(|| black_box(Encoder::encode_frame(message).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_envelope_decode(c: &mut Criterion) {
    let codecs = CodecRegistry::with_defaults();
    let mut group = c.benchmark_group("envelope_decode");

    for entries in [1, 100, 1000] {
        let encoded = Encoder::encode_frame(&create_put_all(entries, &codecs)).unwrap();

        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                let message = decoder.decode_message().unwrap().unwrap();
                assert_eq!(message.kind().code(), RequestKind::PutAll as u16);
                black_box(message.parse_payload::<PutAllRequest>().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_value_codecs(c: &mut Criterion) {
    let codecs = CodecRegistry::with_defaults();
    let mut group = c.benchmark_group("value_codecs");

    let values = [
        ("int", Value::Int(42)),
        ("long", Value::Long(i64::MAX)),
        ("string", Value::from("x".repeat(256))),
        ("binary", Value::Binary(vec![0x42; 256])),
        ("double", Value::Double(std::f64::consts::PI)),
    ];

    for (name, value) in values {
        let encoded = codecs.encode_value(&value).unwrap();
        group.bench_with_input(BenchmarkId::new("encode", name), &value, |b, value| {
            b.iter(|| black_box(codecs.encode_value(value).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", name), &encoded, |b, encoded| {
            b.iter(|| black_box(codecs.decode_value(encoded).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_envelope_encode,
    bench_envelope_decode,
    bench_value_codecs,
);

criterion_main!(benches);
