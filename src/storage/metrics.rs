use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::storage::element::{Direction, ElementKind};

/// Trait for tracking element-store operations.
///
/// Implementations collect statistics about element creation and erasure,
/// segment growth, allocation refusals and ring scans performed by
/// iterators. This information can be used for monitoring and profiling.
pub trait StorageMetrics: Send + Sync {
    /// Records the creation of an element.
    fn element_created(&self, kind: ElementKind);

    /// Records the erasure of an element.
    fn element_erased(&self, kind: ElementKind);

    /// Records that a new segment was engaged.
    fn segment_allocated(&self);

    /// Records an allocation refused with `FullMemory`.
    fn full_memory(&self);

    /// Records one step of an iterator over an incident ring.
    fn ring_scan(&self, direction: Direction);
}

/// A no-op implementation of [`StorageMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {
    fn element_created(&self, _kind: ElementKind) {}
    fn element_erased(&self, _kind: ElementKind) {}
    fn segment_allocated(&self) {}
    fn full_memory(&self) {}
    fn ring_scan(&self, _direction: Direction) {}
}

/// A thread-safe counter-based implementation of [`StorageMetrics`].
///
/// All counters are relaxed atomics; read them through [`CounterMetrics::snapshot`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Nodes created.
    pub nodes_created: AtomicU64,
    /// Nodes erased.
    pub nodes_erased: AtomicU64,
    /// Links created.
    pub links_created: AtomicU64,
    /// Links erased.
    pub links_erased: AtomicU64,
    /// Connectors created.
    pub connectors_created: AtomicU64,
    /// Connectors erased.
    pub connectors_erased: AtomicU64,
    /// Segments engaged.
    pub segments_allocated: AtomicU64,
    /// Allocations refused because memory was full.
    pub full_memory_refusals: AtomicU64,
    /// Outgoing ring steps taken by iterators.
    pub ring_scans_out: AtomicU64,
    /// Incoming ring steps taken by iterators.
    pub ring_scans_in: AtomicU64,
}

/// Plain copy of [`CounterMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Nodes created.
    pub nodes_created: u64,
    /// Nodes erased.
    pub nodes_erased: u64,
    /// Links created.
    pub links_created: u64,
    /// Links erased.
    pub links_erased: u64,
    /// Connectors created.
    pub connectors_created: u64,
    /// Connectors erased.
    pub connectors_erased: u64,
    /// Segments engaged.
    pub segments_allocated: u64,
    /// Allocations refused because memory was full.
    pub full_memory_refusals: u64,
    /// Outgoing ring steps.
    pub ring_scans_out: u64,
    /// Incoming ring steps.
    pub ring_scans_in: u64,
}

impl CounterMetrics {
    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            nodes_created: load(&self.nodes_created),
            nodes_erased: load(&self.nodes_erased),
            links_created: load(&self.links_created),
            links_erased: load(&self.links_erased),
            connectors_created: load(&self.connectors_created),
            connectors_erased: load(&self.connectors_erased),
            segments_allocated: load(&self.segments_allocated),
            full_memory_refusals: load(&self.full_memory_refusals),
            ring_scans_out: load(&self.ring_scans_out),
            ring_scans_in: load(&self.ring_scans_in),
        }
    }
}

impl StorageMetrics for CounterMetrics {
    fn element_created(&self, kind: ElementKind) {
        let counter = match kind {
            ElementKind::Node => &self.nodes_created,
            ElementKind::Link => &self.links_created,
            ElementKind::Connector => &self.connectors_created,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn element_erased(&self, kind: ElementKind) {
        let counter = match kind {
            ElementKind::Node => &self.nodes_erased,
            ElementKind::Link => &self.links_erased,
            ElementKind::Connector => &self.connectors_erased,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn segment_allocated(&self) {
        self.segments_allocated.fetch_add(1, Ordering::Relaxed);
    }

    fn full_memory(&self) {
        self.full_memory_refusals.fetch_add(1, Ordering::Relaxed);
    }

    fn ring_scan(&self, direction: Direction) {
        match direction {
            Direction::Outgoing => self.ring_scans_out.fetch_add(1, Ordering::Relaxed),
            Direction::Incoming => self.ring_scans_in.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`], which discards everything.
pub fn default_metrics() -> Arc<dyn StorageMetrics> {
    Arc::new(NoopMetrics)
}
