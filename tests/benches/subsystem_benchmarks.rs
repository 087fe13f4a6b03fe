//! # Claim-Hub Subsystem Benchmarks
//!
//! | Subsystem | Workload |
//! |-----------|----------|
//! | hub-01 Codec | block decode, script classification, merkle |
//! | hub-04 Block Processor | apply and rewind of claim-heavy blocks |
//! | hub-06 Query Executor | search and resolve, cached and uncached |

use criterion::{criterion_group, criterion_main, Criterion};
use hub_tests::benchmarks::{hub_01_codec, hub_04_block_processor, hub_06_query};

fn codec(c: &mut Criterion) {
    hub_01_codec::register_benchmarks(c);
}

fn block_processor(c: &mut Criterion) {
    hub_04_block_processor::register_benchmarks(c);
}

fn query(c: &mut Criterion) {
    hub_06_query::register_benchmarks(c);
}

criterion_group!(benches, codec, block_processor, query);
criterion_main!(benches);
