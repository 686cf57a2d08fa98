//! The element store: creation, erasure, type changes and link content.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::config::MemoryConfig;
use crate::error::{ScError, ScResult};
use crate::primitives::concurrency::MonitorTable;
use crate::storage::content::LinkContentStore;
use crate::storage::element::{Direction, Element, ElementKind, FLAG_ERASING};
use crate::storage::incidence::{make_incident, remove_incident, walk_ring};
use crate::storage::metrics::{default_metrics, CounterMetrics, MetricsSnapshot, StorageMetrics};
use crate::storage::segment::SegmentTable;
use crate::types::{AccessLevels, ScAddr, ScType};

/// Occupancy of one segment, as reported by [`ScStorage::segment_usage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SegmentUsage {
    /// Segment number, starting at 1.
    pub num: u16,
    /// Slots in the segment.
    pub capacity: u16,
    /// Highest offset ever handed out.
    pub last_engaged: u16,
    /// Live elements.
    pub live: u32,
}

/// Element counts reported by [`ScStorage::stat`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScStat {
    /// Live nodes that are not links.
    pub node_count: u64,
    /// Live links.
    pub link_count: u64,
    /// Live connectors.
    pub connector_count: u64,
    /// Engaged segments.
    pub segments_count: u64,
    /// Free slots across engaged segments.
    pub empty_slots: u64,
}

impl ScStat {
    /// Every live element.
    pub fn element_count(&self) -> u64 {
        self.node_count + self.link_count + self.connector_count
    }
}

/// Outcome of [`ScStorage::validate_incidence`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct IncidenceReport {
    /// Live elements inspected.
    pub elements_checked: u64,
    /// Live connectors among them.
    pub connectors: u64,
    /// Sum of outgoing ring lengths.
    pub outgoing_total: u64,
    /// Sum of incoming ring lengths.
    pub incoming_total: u64,
    /// Human readable descriptions of every violation found.
    pub errors: Vec<String>,
}

impl IncidenceReport {
    /// True when no violation was found.
    pub fn is_consistent(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Default)]
struct Counters {
    nodes: AtomicU64,
    links: AtomicU64,
    connectors: AtomicU64,
}

impl Counters {
    fn of(&self, kind: ElementKind) -> &AtomicU64 {
        match kind {
            ElementKind::Node => &self.nodes,
            ElementKind::Link => &self.links,
            ElementKind::Connector => &self.connectors,
        }
    }
}

/// Segment-backed element store shared by every context of one memory.
///
/// Structural mutations lock the monitors of every address whose rings they
/// touch, in canonical order, and release them before returning. Reads of a
/// single record only take that slot's lock.
pub struct ScStorage {
    segments: SegmentTable,
    monitors: MonitorTable,
    content: LinkContentStore,
    metrics: Arc<dyn StorageMetrics>,
    counter_metrics: Option<Arc<CounterMetrics>>,
    counters: Counters,
}

impl ScStorage {
    /// Creates an empty storage sized by `config`.
    ///
    /// With `config.metrics` set, operations are counted and can be read back
    /// through [`ScStorage::metrics_snapshot`].
    pub fn new(config: &MemoryConfig) -> Self {
        if config.metrics {
            let counters = Arc::new(CounterMetrics::default());
            let metrics: Arc<dyn StorageMetrics> = counters.clone();
            let mut storage = Self::with_metrics(config, metrics);
            storage.counter_metrics = Some(counters);
            storage
        } else {
            Self::with_metrics(config, default_metrics())
        }
    }

    /// Creates an empty storage reporting into `metrics`.
    pub fn with_metrics(config: &MemoryConfig, metrics: Arc<dyn StorageMetrics>) -> Self {
        Self {
            segments: SegmentTable::new(config.max_segments, config.segment_capacity),
            monitors: MonitorTable::new(config.monitor_shards),
            content: LinkContentStore::new(),
            metrics,
            counter_metrics: None,
            counters: Counters::default(),
        }
    }

    /// Counters collected so far, when counting metrics are enabled.
    pub fn metrics_snapshot(&self) -> Option<MetricsSnapshot> {
        self.counter_metrics.as_ref().map(|counters| counters.snapshot())
    }

    pub(crate) fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    /// Monitor table guarding the rings of this storage.
    pub fn monitors(&self) -> &MonitorTable {
        &self.monitors
    }

    pub(crate) fn content(&self) -> &LinkContentStore {
        &self.content
    }

    /// Metrics sink.
    pub fn metrics(&self) -> &Arc<dyn StorageMetrics> {
        &self.metrics
    }

    fn allocate(&self, element: Element) -> ScResult<ScAddr> {
        let before = self.segments.count();
        let result = self.segments.allocate(&element);
        for _ in before..self.segments.count() {
            self.metrics.segment_allocated();
        }
        match result {
            Ok(addr) => {
                let kind = ElementKind::of(element.ty);
                self.counters.of(kind).fetch_add(1, Ordering::Relaxed);
                self.metrics.element_created(kind);
                trace!(addr = %addr, ty = %element.ty, "element allocated");
                Ok(addr)
            }
            Err(err) => {
                if matches!(err, ScError::FullMemory { .. }) {
                    self.metrics.full_memory();
                }
                Err(err)
            }
        }
    }

    /// Allocates a node. `UNKNOWN` yields a plain node.
    pub fn node_new(&self, ty: ScType, access: AccessLevels) -> ScResult<ScAddr> {
        if ty.is_connector() || ty.is_link() {
            return Err(ScError::InvalidType("node type expected"));
        }
        self.allocate(Element::node(ty | ScType::NODE, access))
    }

    /// Allocates a link without content.
    pub fn link_new(&self, ty: ScType, access: AccessLevels) -> ScResult<ScAddr> {
        if ty.is_connector() || ty.has_any(ScType::NODE_MASK & !ScType::LINK) {
            return Err(ScError::InvalidType("link type expected"));
        }
        self.allocate(Element::node(ty | ScType::LINK, access))
    }

    /// Allocates a connector and splices it into its endpoints' rings.
    pub fn connector_new(
        &self,
        ty: ScType,
        begin: ScAddr,
        end: ScAddr,
        access: AccessLevels,
    ) -> ScResult<ScAddr> {
        let kind = ty.masked(ScType::ELEMENT_MASK);
        if !kind.is_connector() || kind.bits().count_ones() != 1 {
            return Err(ScError::InvalidType("connector type expected"));
        }
        if !kind.can_extend_to(ty) {
            return Err(ScError::InvalidType("malformed connector type"));
        }
        if begin.is_empty() || end.is_empty() {
            return Err(ScError::InvalidParams("connector endpoints must not be empty"));
        }

        let _guard = self.monitors.write_n(&[begin, end]);
        for endpoint in [begin, end] {
            if self.segments.read(endpoint, Element::is_erasing)? {
                return Err(ScError::AddrNotValid(endpoint));
            }
        }

        let addr = self.allocate(Element::connector(ty, access, begin, end))?;
        make_incident(&self.segments, addr, begin, Direction::Outgoing)?;
        make_incident(&self.segments, addr, end, Direction::Incoming)?;
        if ty.is_common_edge() && begin != end {
            make_incident(&self.segments, addr, end, Direction::Outgoing)?;
            make_incident(&self.segments, addr, begin, Direction::Incoming)?;
        }
        Ok(addr)
    }

    /// True when `addr` denotes a live element.
    pub fn is_element(&self, addr: ScAddr) -> bool {
        self.segments.is_live(addr)
    }

    /// Type of a live element.
    pub fn element_type(&self, addr: ScAddr) -> ScResult<ScType> {
        self.segments.read(addr, |el| el.ty)
    }

    /// Access levels of a live element.
    pub fn element_access(&self, addr: ScAddr) -> ScResult<AccessLevels> {
        self.segments.read(addr, |el| el.access)
    }

    /// Replaces the access levels of a live element.
    pub fn set_element_access(&self, addr: ScAddr, access: AccessLevels) -> ScResult<()> {
        let _guard = self.monitors.write(addr);
        self.segments.write(addr, |el| el.access = access)
    }

    /// `(begin, end)` of a connector.
    pub fn connector_endpoints(&self, addr: ScAddr) -> ScResult<(ScAddr, ScAddr)> {
        self.segments
            .read(addr, Element::endpoints)?
            .ok_or(ScError::InvalidType("element is not a connector"))
    }

    /// Number of connectors in the outgoing ring.
    pub fn outgoing_count(&self, addr: ScAddr) -> ScResult<u32> {
        self.segments.read(addr, |el| el.out_count)
    }

    /// Number of connectors in the incoming ring.
    pub fn incoming_count(&self, addr: ScAddr) -> ScResult<u32> {
        self.segments.read(addr, |el| el.in_count)
    }

    /// Checks that `addr` may take the type `ty` and returns the merged type.
    ///
    /// Bits of the current type are kept, so callers may pass only the
    /// subtype bits they want to add.
    pub(crate) fn check_subtype(&self, addr: ScAddr, ty: ScType) -> ScResult<ScType> {
        let current = self.element_type(addr)?;
        merge_subtype(current, ty)
    }

    /// Narrows the type of a live element.
    pub fn set_element_subtype(&self, addr: ScAddr, ty: ScType) -> ScResult<()> {
        let _guard = self.monitors.write(addr);
        let merged = self.check_subtype(addr, ty)?;
        self.segments.write(addr, |el| el.ty = merged)
    }

    /// Applies a previously checked type without taking the monitor.
    pub(crate) fn apply_subtype_locked(&self, addr: ScAddr, ty: ScType) -> ScResult<()> {
        self.segments.write(addr, |el| el.ty = ty)
    }

    /// Applies access levels without taking the monitor.
    pub(crate) fn apply_access_locked(&self, addr: ScAddr, access: AccessLevels) -> ScResult<()> {
        self.segments.write(addr, |el| el.access = access)
    }

    fn check_link(&self, addr: ScAddr) -> ScResult<()> {
        if self.element_type(addr)?.is_link() {
            Ok(())
        } else {
            Err(ScError::InvalidType("element is not a link"))
        }
    }

    /// Replaces the content of a link.
    pub fn set_link_content(&self, addr: ScAddr, bytes: &[u8]) -> ScResult<()> {
        let _guard = self.monitors.write(addr);
        self.check_link(addr)?;
        self.content.set(addr, bytes);
        Ok(())
    }

    /// Replaces the content of a link the caller already holds the monitor of.
    pub(crate) fn apply_content_locked(&self, addr: ScAddr, bytes: &[u8]) -> ScResult<()> {
        self.check_link(addr)?;
        self.content.set(addr, bytes);
        Ok(())
    }

    /// Content of a link, `None` if never set.
    pub fn link_content(&self, addr: ScAddr) -> ScResult<Option<Vec<u8>>> {
        self.check_link(addr)?;
        Ok(self.content.get(addr).map(|bytes| bytes.to_vec()))
    }

    /// Links whose content equals `bytes`.
    pub fn find_links_with_content(&self, bytes: &[u8]) -> Vec<ScAddr> {
        self.content.find_by_content(bytes)
    }

    /// Links whose content contains `needle`.
    pub fn find_links_by_content_substring(&self, needle: &[u8]) -> Vec<ScAddr> {
        self.content.find_by_substring(needle)
    }

    /// Distinct contents containing `needle`.
    pub fn find_link_contents_by_substring(&self, needle: &[u8]) -> Vec<Vec<u8>> {
        self.content.find_contents_by_substring(needle)
    }

    /// Connectors of both rings of `addr`, outgoing first.
    pub(crate) fn incident_connectors(&self, addr: ScAddr) -> ScResult<Vec<ScAddr>> {
        let _guard = self.monitors.read(addr);
        let mut found = Vec::new();
        for dir in Direction::BOTH {
            walk_ring(&self.segments, addr, dir, |c| found.push(c))?;
        }
        Ok(found)
    }

    fn mark_erasing(&self, addr: ScAddr) -> ScResult<bool> {
        self.segments.write(addr, |el| {
            if el.is_erasing() {
                false
            } else {
                el.flags |= FLAG_ERASING;
                true
            }
        })
    }

    /// Erases `addr` together with every connector attached to it, recursively.
    ///
    /// Returns the erased addresses, connectors before the elements they were
    /// attached to. Erasing an element another thread is already erasing
    /// returns an empty list.
    pub fn erase_element(&self, addr: ScAddr) -> ScResult<Vec<ScAddr>> {
        if addr.is_empty() {
            return Err(ScError::InvalidParams("empty address"));
        }
        if !self.mark_erasing(addr)? {
            return Ok(Vec::new());
        }
        let mut marked = vec![addr];
        let result = self
            .collect_cascade(addr, &mut marked)
            .and_then(|order| self.erase_in_order(&order).map(|()| order));
        match result {
            Ok(order) => {
                debug!(addr = %addr, erased = order.len(), "element erased");
                Ok(order)
            }
            Err(err) => {
                warn!(addr = %addr, error = %err, "erase aborted");
                self.unmark_erasing(&marked);
                Err(err)
            }
        }
    }

    /// Clears the erase mark of every element in `marked` that is still live.
    fn unmark_erasing(&self, marked: &[ScAddr]) {
        for addr in marked {
            if let Err(err) = self.segments.write(*addr, |el| el.flags &= !FLAG_ERASING) {
                if !err.is_addr_not_valid() {
                    warn!(addr = %addr, error = %err, "erase mark not cleared");
                }
            }
        }
    }

    /// Marks and orders the cascade rooted at `root` (post-order).
    ///
    /// Every connector marked here is also pushed onto `marked`.
    fn collect_cascade(&self, root: ScAddr, marked: &mut Vec<ScAddr>) -> ScResult<Vec<ScAddr>> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((addr, expanded)) = stack.pop() {
            if expanded {
                order.push(addr);
                continue;
            }
            stack.push((addr, true));
            for conn in self.incident_connectors(addr)? {
                match self.mark_erasing(conn) {
                    Ok(true) => {
                        marked.push(conn);
                        stack.push((conn, false));
                    }
                    Ok(false) => {}
                    Err(err) if err.is_addr_not_valid() => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(order)
    }

    /// Frees every marked element once its rings are empty.
    ///
    /// An element whose ring still holds a connector being erased by another
    /// thread is retried on the next pass.
    fn erase_in_order(&self, order: &[ScAddr]) -> ScResult<()> {
        let mut pending = order.to_vec();
        loop {
            let mut busy = Vec::new();
            for addr in pending {
                if !self.erase_single(addr)? {
                    busy.push(addr);
                }
            }
            if busy.is_empty() {
                return Ok(());
            }
            pending = busy;
            std::thread::yield_now();
        }
    }

    fn erase_single(&self, addr: ScAddr) -> ScResult<bool> {
        let (ty, endpoints) = self.segments.read(addr, |el| (el.ty, el.endpoints()))?;
        let mut lock_set: SmallVec<[ScAddr; 3]> = SmallVec::new();
        lock_set.push(addr);
        if let Some((begin, end)) = endpoints {
            lock_set.push(begin);
            lock_set.push(end);
        }
        let _guard = self.monitors.write_n(&lock_set);

        if self.segments.read(addr, Element::has_incident)? {
            return Ok(false);
        }
        if let Some((begin, end)) = endpoints {
            remove_incident(&self.segments, addr, begin, Direction::Outgoing)?;
            remove_incident(&self.segments, addr, end, Direction::Incoming)?;
            if ty.is_common_edge() && begin != end {
                remove_incident(&self.segments, addr, end, Direction::Outgoing)?;
                remove_incident(&self.segments, addr, begin, Direction::Incoming)?;
            }
        }
        if ty.is_link() {
            self.content.remove(addr);
        }
        self.segments.free(addr)?;

        let kind = ElementKind::of(ty);
        self.counters.of(kind).fetch_sub(1, Ordering::Relaxed);
        self.metrics.element_erased(kind);
        trace!(addr = %addr, ty = %ty, "element freed");
        Ok(true)
    }

    /// Element counts and segment usage.
    pub fn stat(&self) -> ScStat {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ScStat {
            node_count: load(&self.counters.nodes),
            link_count: load(&self.counters.links),
            connector_count: load(&self.counters.connectors),
            segments_count: self.segments.count() as u64,
            empty_slots: self.segments.empty_slots(),
        }
    }

    /// Per-segment occupancy, in segment order.
    pub fn segment_usage(&self) -> Vec<SegmentUsage> {
        self.segments
            .iter()
            .map(|segment| {
                let cursor = segment.cursor();
                SegmentUsage {
                    num: segment.num(),
                    capacity: segment.capacity(),
                    last_engaged: cursor.last_engaged,
                    live: cursor.live,
                }
            })
            .collect()
    }

    /// Recomputes the element counters from the slots, after a restore.
    pub(crate) fn recount(&self) {
        let mut counts = [0u64; 3];
        for segment in self.segments.iter() {
            for (_, el) in segment.live_elements() {
                counts[ElementKind::of(el.ty) as usize] += 1;
            }
        }
        self.counters.nodes.store(counts[ElementKind::Node as usize], Ordering::Relaxed);
        self.counters.links.store(counts[ElementKind::Link as usize], Ordering::Relaxed);
        self.counters
            .connectors
            .store(counts[ElementKind::Connector as usize], Ordering::Relaxed);
    }

    /// Walks every ring of every live element and cross-checks the links.
    ///
    /// Meant for quiescent graphs: it locks one owner at a time, so rings
    /// mutated concurrently may be reported as inconsistent.
    pub fn validate_incidence(&self) -> IncidenceReport {
        let mut report = IncidenceReport::default();
        let mut expected_entries = 0u64;

        for segment in self.segments.iter() {
            for (offset, el) in segment.live_elements() {
                let owner = ScAddr::new(segment.num(), offset);
                report.elements_checked += 1;
                if el.ty.is_unknown() {
                    report.errors.push(format!("{owner}: live slot with unknown type"));
                }
                if let Some((begin, end)) = el.endpoints() {
                    report.connectors += 1;
                    expected_entries += el.expected_ring_entries();
                    for endpoint in [begin, end] {
                        if !self.segments.is_live(endpoint) {
                            report
                                .errors
                                .push(format!("{owner}: endpoint {endpoint} is not live"));
                        }
                    }
                }
                let _guard = self.monitors.read(owner);
                for dir in Direction::BOTH {
                    self.validate_ring(owner, dir, &mut report);
                }
            }
        }

        let entries = report.outgoing_total + report.incoming_total;
        if entries != expected_entries {
            report.errors.push(format!(
                "rings hold {entries} entries but live connectors require {expected_entries}"
            ));
        }
        report
    }

    fn validate_ring(&self, owner: ScAddr, dir: Direction, report: &mut IncidenceReport) {
        let Ok((head, count)) = self.segments.read(owner, |el| (el.head(dir), el.count(dir))) else {
            return;
        };
        match dir {
            Direction::Outgoing => report.outgoing_total += count as u64,
            Direction::Incoming => report.incoming_total += count as u64,
        }
        if head.is_empty() {
            if count != 0 {
                report
                    .errors
                    .push(format!("{owner}: empty {} ring with count {count}", dir.as_str()));
            }
            return;
        }

        let mut cur = head;
        let mut steps = 0u32;
        loop {
            let link = match self.segments.read(cur, |el| el.ring_link(owner, dir)) {
                Ok(Some(link)) => link,
                Ok(None) => {
                    report.errors.push(format!(
                        "{owner}: {cur} in {} ring does not reference the owner",
                        dir.as_str()
                    ));
                    return;
                }
                Err(_) => {
                    report
                        .errors
                        .push(format!("{owner}: {} ring reaches dead slot {cur}", dir.as_str()));
                    return;
                }
            };
            let back = self
                .segments
                .read(link.next, |el| el.ring_link(owner, dir).map(|l| l.prev));
            if !matches!(back, Ok(Some(prev)) if prev == cur) {
                report.errors.push(format!(
                    "{owner}: {} ring link {cur} -> {} is not symmetric",
                    dir.as_str(),
                    link.next
                ));
                return;
            }
            steps += 1;
            cur = link.next;
            if cur == head {
                break;
            }
            if steps > count {
                report.errors.push(format!(
                    "{owner}: {} ring does not close within {count} steps",
                    dir.as_str()
                ));
                return;
            }
        }
        if steps != count {
            report.errors.push(format!(
                "{owner}: {} ring has {steps} entries but count {count}",
                dir.as_str()
            ));
        }
    }
}

/// Narrows `current` by `ty`, refusing changes of kind or of a fixed group.
pub(crate) fn merge_subtype(current: ScType, ty: ScType) -> ScResult<ScType> {
    let merged = ty | current;
    if merged.is_link() != current.is_link() || !current.can_extend_to(merged) {
        return Err(ScError::InvalidType("type can not be narrowed to the requested subtype"));
    }
    Ok(merged)
}
