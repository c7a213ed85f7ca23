//! Adapters: concrete implementations of the domain ports.
//!
//! The in-memory stores back tests and the default CLI run; the RocksDB
//! stores (behind the `storage-rocksdb` feature) persist orders across
//! process restarts so the recovery sweep has something to re-arm.

pub mod gateway;
pub mod hasher;
pub mod in_memory;

#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
