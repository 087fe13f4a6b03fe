//! # Claim-Hub Benchmarks
//!
//! Criterion workloads per subsystem. Each module exposes
//! `register_benchmarks`, called from `benches/subsystem_benchmarks.rs`.

pub mod hub_01_codec;
pub mod hub_04_block_processor;
pub mod hub_06_query;
