//! # hub-04 Block Processor Benchmarks
//!
//! Applying and rewinding claim-heavy blocks over in-memory storage. Each
//! iteration starts from a freshly synced node so the store size is the
//! same every time.

use std::time::Duration;

use criterion::{black_box, BatchSize, BenchmarkId, Criterion, Throughput};

use crate::integration::chain::{extend_random, ChainBuilder, Node};

const BASE_HEIGHT: u32 = 200;

fn workload(blocks: u32) -> (ChainBuilder, ChainBuilder, usize) {
    let base = ChainBuilder::with_empty_blocks(BASE_HEIGHT);
    let mut chain = base.clone();
    let txs = extend_random(&mut chain, 17, blocks, 1);
    (base, chain, txs)
}

pub fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-04/advance");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for blocks in [10, 50] {
        let (base, chain, txs) = workload(blocks);
        group.throughput(Throughput::Elements(txs as u64));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &chain, |b, chain| {
            b.iter_batched(
                || Node::synced_to(&base, 500),
                |node| {
                    node.apply_all(chain.blocks_from(BASE_HEIGHT));
                    black_box(node.height())
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

pub fn bench_rewind(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-04/rewind");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for blocks in [10, 50] {
        let (_, chain, _) = workload(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &chain, |b, chain| {
            b.iter_batched(
                || Node::synced_to(chain, 500),
                |node| black_box(node.processor.rewind(BASE_HEIGHT - 1).expect("within limit")),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_advance(c);
    bench_rewind(c);
}
