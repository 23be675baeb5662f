use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mmdb_reader::{pack, DataDecoder, Database};
use std::hint::black_box;
use std::time::Duration;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{country, DatabaseWriter};

/// One /24 per entry spread over 10.0.0.0/8, plus IPv6 /48s when dual-stack
fn build_database(ip_version: u16, record_size: u16, entries: u32) -> Vec<u8> {
    let mut writer = DatabaseWriter::new(ip_version, record_size);
    for i in 0..entries {
        let cidr = format!("10.{}.{}.0/24", (i >> 8) & 0xFF, i & 0xFF);
        writer.insert(&cidr, &country("DE", "Germany", "Deutschland"));
        if ip_version == 6 {
            let cidr = format!("2001:db8:{:x}::/48", i);
            writer.insert(&cidr, &country("FR", "France", "Frankreich"));
        }
    }
    writer.build()
}

fn queries(count: u32) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i % 4 == 0 {
                // Miss
                format!("192.0.2.{}", i & 0xFF)
            } else {
                format!("10.{}.{}.{}", (i >> 8) & 0xFF, i & 0xFF, (i * 7) & 0xFF)
            }
        })
        .collect()
}

/// Lookups across record sizes and tree types
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    group.measurement_time(Duration::from_secs(5));

    let queries = queries(1000);
    group.throughput(Throughput::Elements(queries.len() as u64));

    for ip_version in [4u16, 6] {
        for record_size in [24u16, 28, 32] {
            let db = Database::from_bytes(build_database(ip_version, record_size, 2000)).unwrap();
            let id = format!("ipv{}_{}bit", ip_version, record_size);

            group.bench_with_input(BenchmarkId::new("text", &id), &queries, |b, queries| {
                b.iter(|| {
                    for query in queries {
                        black_box(db.lookup(query).unwrap());
                    }
                });
            });
        }
    }

    group.finish();
}

/// Pre-packed lookups isolate the tree walk and decode from text parsing
fn bench_lookup_packed(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_packed");

    let db = Database::from_bytes(build_database(6, 28, 2000)).unwrap();
    let packed: Vec<_> = queries(1000).iter().map(|q| pack(q).unwrap()).collect();
    group.throughput(Throughput::Elements(packed.len() as u64));

    group.bench_function("ipv6_28bit", |b| {
        b.iter(|| {
            for addr in &packed {
                black_box(db.lookup_packed(addr).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let bytes = build_database(6, 24, 2000);
    c.bench_function("open_and_read_metadata", |b| {
        b.iter(|| {
            let db = Database::from_bytes(black_box(bytes.clone())).unwrap();
            black_box(db.metadata().unwrap().node_count)
        });
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut section = Vec::new();
    common::encode(&country("DE", "Germany", "Deutschland"), &mut section);

    c.bench_function("decode_country_record", |b| {
        let decoder = DataDecoder::new(&section, 0);
        b.iter(|| black_box(decoder.decode_value(black_box(0)).unwrap()));
    });
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    for text in ["192.168.100.200", "2001:db8::1", "2001:0db8:85a3:0000:0000:8a2e:0370:7334"] {
        group.bench_with_input(BenchmarkId::from_parameter(text), text, |b, text| {
            b.iter(|| black_box(pack(text).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_lookup,
    bench_lookup_packed,
    bench_open,
    bench_decode,
    bench_pack
);
criterion_main!(benches);
