// src/path_tracing/mod.rs
// Progressive accumulation control and environment light-sampling tables.
// The ray dispatch itself lives with the render backend; this module decides
// what to trace next and how emitted light is importance sampled.
// RELEVANT FILES: src/path_tracing/accumulation.rs, src/path_tracing/alias_table.rs

pub mod accumulation;
pub mod alias_table;

pub use accumulation::{AccumulationParams, AccumulationScheduler, Advance, Phase};
pub use alias_table::{AliasEntry, AliasTable};
