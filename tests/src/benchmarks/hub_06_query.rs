//! # hub-06 Query Benchmarks
//!
//! Search and resolve straight over a storage snapshot, and the cached
//! path through the executor.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, Criterion};
use hub_06_query_executor::{
    ClaimReader, Deadline, MemorySearchIndex, QueryApi, QueryConfig, QueryExecutor, SearchConstraints,
    SearchIndex, SearchIndexer,
};
use serde_json::{json, Map, Value};

use crate::integration::chain::{extend_random, ChainBuilder, Node};

fn indexed_node() -> (Node, Arc<dyn SearchIndex>) {
    let mut chain = ChainBuilder::with_empty_blocks(400);
    extend_random(&mut chain, 33, 300, 1);
    let node = Node::synced_to(&chain, 500);
    let index: Arc<dyn SearchIndex> = Arc::new(MemorySearchIndex::new());
    SearchIndexer::new(node.db().clone(), index.clone())
        .rebuild()
        .expect("claims readable");
    (node, index)
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn bench_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-06/reader");
    group.measurement_time(Duration::from_secs(5));
    let (node, index) = indexed_node();

    let searches = [
        ("by_name", json!({"name": "foo"})),
        ("text", json!({"text": "baz"})),
        ("controlling", json!({"is_controlling": true, "order_by": ["effective_amount"]})),
        ("amount_range", json!({"effective_amount": ">=100", "limit": 50})),
    ];
    for (label, query) in searches {
        let constraints = SearchConstraints::from_params(&params(query)).expect("valid query");
        group.bench_function(label, |b| {
            b.iter(|| {
                let view = node.db().snapshot();
                let mut reader = ClaimReader::new(&view, index.as_ref(), Deadline::after(Duration::from_secs(10)));
                black_box(reader.search(&constraints).expect("search runs"))
            })
        });
    }

    let urls: Vec<String> = ["foo", "bar", "baz", "qux", "missing"]
        .iter()
        .map(|name| format!("lbry://{name}"))
        .collect();
    group.bench_function("resolve_5", |b| {
        b.iter(|| {
            let view = node.db().snapshot();
            let mut reader = ClaimReader::new(&view, index.as_ref(), Deadline::after(Duration::from_secs(10)));
            black_box(reader.resolve(&urls).expect("resolve runs"))
        })
    });

    group.finish();
}

pub fn bench_cached_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-06/executor");
    let (node, index) = indexed_node();
    let executor = QueryExecutor::new(node.db().clone(), index, QueryConfig::default());
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let query = params(json!({"name": "foo"}));

    group.bench_function("cached_search", |b| {
        b.iter(|| black_box(runtime.block_on(executor.search(query.clone())).expect("search runs")))
    });
    group.bench_function("uncached_search", |b| {
        b.iter(|| {
            executor.invalidate();
            black_box(runtime.block_on(executor.search(query.clone())).expect("search runs"))
        })
    });

    group.finish();
}

pub fn register_benchmarks(c: &mut Criterion) {
    bench_reader(c);
    bench_cached_search(c);
}
