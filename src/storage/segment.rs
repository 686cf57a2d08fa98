//! Segments of element slots and the allocator on top of them.
//!
//! A segment is a fixed array of slots addressed by offset `1..=capacity`;
//! offset 0 is never handed out so `{seg, 0}` can not alias a live element.
//! Each segment keeps its own cursor (highest offset ever engaged plus a chain
//! of released offsets threaded through the empty slots) behind a short mutex,
//! so concurrent allocations only contend when they land on the same segment.
//! The segment table itself is a preallocated array of once-cells: lookups
//! never take a lock and growth is serialized by a dedicated mutex.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::error::{ScError, ScResult};
use crate::storage::element::{Element, Slot};
use crate::types::ScAddr;

/// Slots per segment when none is configured.
pub const DEFAULT_SEGMENT_CAPACITY: u16 = u16::MAX;
/// Segment limit when none is configured.
pub const DEFAULT_MAX_SEGMENTS: u16 = u16::MAX;

/// Allocation state of one segment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SegmentCursor {
    /// Highest offset handed out so far.
    pub last_engaged: u16,
    /// Head of the released-offset chain, 0 when empty.
    pub free_head: u16,
    /// Live slots.
    pub live: u32,
}

pub(crate) struct Segment {
    num: u16,
    slots: Box<[RwLock<Slot>]>,
    cursor: Mutex<SegmentCursor>,
}

impl Segment {
    fn new(num: u16, capacity: u16) -> Self {
        let slots = (0..=capacity as usize)
            .map(|_| RwLock::new(Slot::Empty { next_free: 0 }))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            num,
            slots,
            cursor: Mutex::new(SegmentCursor::default()),
        }
    }

    pub(crate) fn num(&self) -> u16 {
        self.num
    }

    pub(crate) fn capacity(&self) -> u16 {
        (self.slots.len() - 1) as u16
    }

    pub(crate) fn cursor(&self) -> SegmentCursor {
        *self.cursor.lock()
    }

    fn slot(&self, offset: u16) -> Option<&RwLock<Slot>> {
        if offset == 0 {
            return None;
        }
        self.slots.get(offset as usize)
    }

    /// Claims a slot and stores `element` in it; `None` when the segment is full.
    fn try_allocate(&self, element: &Element) -> ScResult<Option<u16>> {
        let mut cursor = self.cursor.lock();
        let offset = if cursor.free_head != 0 {
            let offset = cursor.free_head;
            let mut slot = self.slots[offset as usize].write();
            match *slot {
                Slot::Empty { next_free } => cursor.free_head = next_free,
                Slot::Live(_) => return Err(ScError::Corruption("live slot on the free chain")),
            }
            *slot = Slot::Live(element.clone());
            offset
        } else if cursor.last_engaged < self.capacity() {
            cursor.last_engaged += 1;
            let offset = cursor.last_engaged;
            *self.slots[offset as usize].write() = Slot::Live(element.clone());
            offset
        } else {
            return Ok(None);
        };
        cursor.live += 1;
        Ok(Some(offset))
    }

    fn free(&self, offset: u16) -> ScResult<()> {
        let mut cursor = self.cursor.lock();
        let slot = self
            .slot(offset)
            .ok_or(ScError::AddrNotValid(ScAddr::new(self.num, offset)))?;
        let mut slot = slot.write();
        if matches!(*slot, Slot::Empty { .. }) {
            return Err(ScError::AddrNotValid(ScAddr::new(self.num, offset)));
        }
        *slot = Slot::Empty {
            next_free: cursor.free_head,
        };
        cursor.free_head = offset;
        cursor.live -= 1;
        Ok(())
    }

    fn has_room(&self) -> bool {
        let cursor = self.cursor.lock();
        cursor.free_head != 0 || cursor.last_engaged < self.capacity()
    }

    /// Snapshot of every live slot, for persistence and validation.
    pub(crate) fn live_elements(&self) -> Vec<(u16, Element)> {
        let last = self.cursor().last_engaged;
        (1..=last)
            .filter_map(|offset| match &*self.slots[offset as usize].read() {
                Slot::Live(el) => Some((offset, el.clone())),
                Slot::Empty { .. } => None,
            })
            .collect()
    }

    /// Rebuilds a segment from persisted state.
    pub(crate) fn restore(
        num: u16,
        capacity: u16,
        cursor: SegmentCursor,
        free_links: &[(u16, u16)],
        elements: Vec<(u16, Element)>,
    ) -> ScResult<Self> {
        let last = cursor.last_engaged;
        if last > capacity || cursor.free_head > last {
            return Err(ScError::Corruption("segment cursor exceeds capacity"));
        }
        let engaged = |offset: u16| (1..=last).contains(&offset);
        let segment = Segment::new(num, capacity);
        let mut seen = vec![false; last as usize + 1];
        let mut claim = |offset: u16| -> ScResult<()> {
            if std::mem::replace(&mut seen[offset as usize], true) {
                Err(ScError::Corruption("slot offset restored twice"))
            } else {
                Ok(())
            }
        };
        for &(offset, next_free) in free_links {
            if !engaged(offset) || next_free > last {
                return Err(ScError::Corruption("free slot offset out of range"));
            }
            claim(offset)?;
            *segment.slots[offset as usize].write() = Slot::Empty { next_free };
        }
        let mut live = 0;
        for (offset, element) in elements {
            if !engaged(offset) {
                return Err(ScError::Corruption("element offset out of range"));
            }
            claim(offset)?;
            *segment.slots[offset as usize].write() = Slot::Live(element);
            live += 1;
        }
        *segment.cursor.lock() = SegmentCursor { live, ..cursor };
        Ok(segment)
    }

    /// Released-offset chain as `(offset, next_free)` pairs.
    pub(crate) fn free_chain(&self) -> Vec<(u16, u16)> {
        let mut chain = Vec::new();
        let mut offset = self.cursor().free_head;
        while offset != 0 && chain.len() <= self.capacity() as usize {
            match &*self.slots[offset as usize].read() {
                Slot::Empty { next_free } => {
                    chain.push((offset, *next_free));
                    offset = *next_free;
                }
                Slot::Live(_) => break,
            }
        }
        chain
    }
}

/// Every segment of one storage instance.
pub(crate) struct SegmentTable {
    segments: Box<[OnceLock<Box<Segment>>]>,
    count: AtomicUsize,
    grow: Mutex<()>,
    hint: AtomicUsize,
    capacity: u16,
}

impl SegmentTable {
    pub(crate) fn new(max_segments: u16, capacity: u16) -> Self {
        let segments = (0..max_segments.max(1))
            .map(|_| OnceLock::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            segments,
            count: AtomicUsize::new(0),
            grow: Mutex::new(()),
            hint: AtomicUsize::new(0),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn max_segments(&self) -> u16 {
        self.segments.len() as u16
    }

    pub(crate) fn capacity(&self) -> u16 {
        self.capacity
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn by_index(&self, idx: usize) -> Option<&Segment> {
        if idx >= self.count() {
            return None;
        }
        self.segments[idx].get().map(|segment| &**segment)
    }

    pub(crate) fn segment(&self, num: u16) -> Option<&Segment> {
        if num == 0 {
            return None;
        }
        self.by_index(num as usize - 1)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Segment> + '_ {
        (0..self.count()).filter_map(|idx| self.by_index(idx))
    }

    fn slot(&self, addr: ScAddr) -> ScResult<&RwLock<Slot>> {
        if addr.is_empty() {
            return Err(ScError::InvalidParams("empty address"));
        }
        self.segment(addr.seg())
            .and_then(|segment| segment.slot(addr.offset()))
            .ok_or(ScError::AddrNotValid(addr))
    }

    /// True when `addr` denotes a live element.
    pub(crate) fn is_live(&self, addr: ScAddr) -> bool {
        self.slot(addr)
            .map(|slot| matches!(*slot.read(), Slot::Live(_)))
            .unwrap_or(false)
    }

    /// Runs `f` on the element at `addr` under its slot read lock.
    pub(crate) fn read<R>(&self, addr: ScAddr, f: impl FnOnce(&Element) -> R) -> ScResult<R> {
        let slot: RwLockReadGuard<'_, Slot> = self.slot(addr)?.read();
        match &*slot {
            Slot::Live(el) => Ok(f(el)),
            Slot::Empty { .. } => Err(ScError::AddrNotValid(addr)),
        }
    }

    /// Runs `f` on the element at `addr` under its slot write lock.
    pub(crate) fn write<R>(&self, addr: ScAddr, f: impl FnOnce(&mut Element) -> R) -> ScResult<R> {
        let mut slot: RwLockWriteGuard<'_, Slot> = self.slot(addr)?.write();
        match &mut *slot {
            Slot::Live(el) => Ok(f(el)),
            Slot::Empty { .. } => Err(ScError::AddrNotValid(addr)),
        }
    }

    /// Stores `element` in a free slot, growing the table when needed.
    pub(crate) fn allocate(&self, element: &Element) -> ScResult<ScAddr> {
        loop {
            let count = self.count();
            if let Some(addr) = self.scan(count, element)? {
                return Ok(addr);
            }

            let _grow = self.grow.lock();
            if self.count() != count {
                continue;
            }
            if count >= self.segments.len() {
                if let Some(addr) = self.scan(count, element)? {
                    return Ok(addr);
                }
                warn!(max_segments = self.segments.len(), "segment table exhausted");
                return Err(ScError::FullMemory {
                    max_segments: self.max_segments(),
                });
            }
            let num = (count + 1) as u16;
            if self.segments[count]
                .set(Box::new(Segment::new(num, self.capacity)))
                .is_err()
            {
                return Err(ScError::Corruption("segment initialized twice"));
            }
            self.count.store(count + 1, Ordering::Release);
            self.hint.store(count, Ordering::Relaxed);
            debug!(segment = num, capacity = self.capacity, "allocated segment");
        }
    }

    fn scan(&self, count: usize, element: &Element) -> ScResult<Option<ScAddr>> {
        if count == 0 {
            return Ok(None);
        }
        let start = self.hint.load(Ordering::Relaxed) % count;
        for step in 0..count {
            let idx = (start + step) % count;
            let Some(segment) = self.by_index(idx) else {
                continue;
            };
            if let Some(offset) = segment.try_allocate(element)? {
                if step != 0 {
                    self.hint.store(idx, Ordering::Relaxed);
                }
                return Ok(Some(ScAddr::new(segment.num(), offset)));
            }
        }
        Ok(None)
    }

    /// Releases the slot at `addr` for reuse.
    pub(crate) fn free(&self, addr: ScAddr) -> ScResult<()> {
        let segment = self
            .segment(addr.seg())
            .ok_or(ScError::AddrNotValid(addr))?;
        segment.free(addr.offset())?;
        self.hint
            .store(addr.seg() as usize - 1, Ordering::Relaxed);
        Ok(())
    }

    /// Installs a restored segment; segments must arrive in order.
    pub(crate) fn install(&self, segment: Segment) -> ScResult<()> {
        let _grow = self.grow.lock();
        let count = self.count();
        if segment.num() as usize != count + 1 || count >= self.segments.len() {
            return Err(ScError::Corruption("segment number out of sequence"));
        }
        if segment.capacity() != self.capacity {
            return Err(ScError::Corruption("segment capacity mismatch"));
        }
        if self.segments[count].set(Box::new(segment)).is_err() {
            return Err(ScError::Corruption("segment initialized twice"));
        }
        self.count.store(count + 1, Ordering::Release);
        Ok(())
    }

    /// Free slots across all allocated segments.
    pub(crate) fn empty_slots(&self) -> u64 {
        self.iter()
            .map(|segment| segment.capacity() as u64 - segment.cursor().live as u64)
            .sum()
    }

    /// Picks the segment to try first after a restore.
    pub(crate) fn refresh_hint(&self) {
        if let Some(idx) = (0..self.count()).find(|&idx| {
            self.by_index(idx)
                .map(|segment| segment.has_room())
                .unwrap_or(false)
        }) {
            self.hint.store(idx, Ordering::Relaxed);
        }
    }
}
