//! # hub-01 Codec Benchmarks
//!
//! Block decoding and output script classification, the two codec paths
//! every synced block goes through.

use std::time::Duration;

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use hub_01_codec::test_utils::{claim_script, p2pkh_script, stream_value};
use hub_01_codec::{merkle_branch, merkle_root, output_hashx, Block, OutputScript};

use crate::integration::chain::{extend_random, ChainBuilder};

/// The busiest block of a random claim workload, re-packed with `copies`
/// times its transactions.
fn busy_block(copies: usize) -> Block {
    let mut chain = ChainBuilder::with_empty_blocks(200);
    extend_random(&mut chain, 9, 150, 1);
    let busiest = chain
        .blocks()
        .iter()
        .max_by_key(|block| block.transactions.len())
        .cloned()
        .expect("chain is not empty");
    let mut block = busiest.clone();
    for _ in 1..copies {
        block
            .transactions
            .extend(busiest.transactions.iter().skip(1).cloned());
    }
    block
}

pub fn bench_block_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-01/block_decode");
    group.measurement_time(Duration::from_secs(5));

    for copies in [1, 10, 100] {
        let block = busy_block(copies);
        let raw = block.encode();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(block.transactions.len()), &raw, |b, raw| {
            b.iter(|| black_box(Block::decode(raw).expect("block decodes")))
        });
    }

    group.finish();
}

pub fn bench_script_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-01/output_script");

    let payment = p2pkh_script([7; 20]);
    let claim = claim_script("benchmark-name", &stream_value("A benchmark stream"), [7; 20]);

    group.bench_function("parse_p2pkh", |b| {
        b.iter(|| black_box(OutputScript::parse(&payment)))
    });
    group.bench_function("parse_claim", |b| {
        b.iter(|| black_box(OutputScript::parse(&claim)))
    });
    group.bench_function("hashx_of_claim", |b| b.iter(|| black_box(output_hashx(&claim))));

    group.finish();
}

pub fn bench_merkle(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-01/merkle");

    for count in [16usize, 256, 4096] {
        let hashes: Vec<[u8; 32]> = (0..count)
            .map(|i| shared_types::sha256(&i.to_le_bytes()))
            .collect();
        group.bench_with_input(BenchmarkId::new("root", count), &hashes, |b, hashes| {
            b.iter(|| black_box(merkle_root(hashes)))
        });
        group.bench_with_input(BenchmarkId::new("branch", count), &hashes, |b, hashes| {
            b.iter(|| black_box(merkle_branch(hashes, hashes.len() / 2)))
        });
    }

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_block_decode(c);
    bench_script_classification(c);
    bench_merkle(c);
}
