//! Segment-based element storage.
//!
//! Elements live in fixed-size slots grouped into segments. Connectors are
//! threaded into circular incident rings of their endpoints, link content is
//! kept in a separate content store, and the whole graph can be dumped to and
//! restored from a single file.

/// Link content and its hash index.
pub mod content;
/// Element records and ring roles.
pub mod element;
/// Dump and restore of the whole storage.
pub mod fs_memory;
/// Operation counters.
pub mod metrics;

mod graph;
mod incidence;
mod segment;

pub(crate) use graph::merge_subtype;
pub use graph::{IncidenceReport, ScStat, ScStorage, SegmentUsage};
pub(crate) use incidence::ring_next;
pub use segment::{DEFAULT_MAX_SEGMENTS, DEFAULT_SEGMENT_CAPACITY};
pub(crate) use segment::{Segment, SegmentCursor, SegmentTable};
