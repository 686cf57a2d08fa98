//! Low-level primitives for building the storage engine.
//!
//! Currently only the per-address monitor table used to serialize
//! structural mutation.

/// Concurrency primitives and synchronization.
///
/// Per-address reader/writer monitors acquired in canonical address order.
pub mod concurrency;
