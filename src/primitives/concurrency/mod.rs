use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::types::ScAddr;

/// Reader/writer lock guarding the structure around one address.
pub type Monitor = Arc<RwLock<()>>;

/// Number of shards used when none is configured.
pub const DEFAULT_MONITOR_SHARDS: usize = 64;

/// Table mapping addresses to their monitors.
///
/// Monitors are created on first use and dropped again once no guard or
/// handle refers to them. Multi-address acquisition always locks in ascending
/// [`ScAddr`] order, which is what keeps concurrent pairwise mutations free of
/// deadlocks.
pub struct MonitorTable {
    shards: Box<[RwLock<FxHashMap<ScAddr, Monitor>>]>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    Read,
    Write,
}

enum Held {
    Read(#[allow(dead_code)] ArcRwLockReadGuard<RawRwLock, ()>),
    Write(#[allow(dead_code)] ArcRwLockWriteGuard<RawRwLock, ()>),
}

/// Guard holding one or more monitors; released in reverse acquisition order on drop.
pub struct MonitorGuard<'t> {
    table: &'t MonitorTable,
    held: SmallVec<[(ScAddr, Held); 4]>,
}

impl MonitorTable {
    /// Creates a table with `shards` independent maps (at least one).
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { shards }
    }

    fn shard(&self, addr: ScAddr) -> &RwLock<FxHashMap<ScAddr, Monitor>> {
        let mut hasher = FxHasher::default();
        addr.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Returns the monitor for `addr`, creating it if absent.
    pub fn monitor(&self, addr: ScAddr) -> Monitor {
        let shard = self.shard(addr);
        if let Some(existing) = shard.read().get(&addr) {
            return Arc::clone(existing);
        }
        let mut map = shard.write();
        Arc::clone(map.entry(addr).or_default())
    }

    /// Shared lock on one address.
    pub fn read(&self, addr: ScAddr) -> MonitorGuard<'_> {
        self.acquire(&[addr], Mode::Read)
    }

    /// Exclusive lock on one address.
    pub fn write(&self, addr: ScAddr) -> MonitorGuard<'_> {
        self.acquire(&[addr], Mode::Write)
    }

    /// Shared locks on several addresses, taken in canonical order.
    pub fn read_n(&self, addrs: &[ScAddr]) -> MonitorGuard<'_> {
        self.acquire(addrs, Mode::Read)
    }

    /// Exclusive locks on several addresses, taken in canonical order.
    ///
    /// Duplicates and empty addresses are skipped, so a self-loop locks its
    /// single endpoint once.
    pub fn write_n(&self, addrs: &[ScAddr]) -> MonitorGuard<'_> {
        self.acquire(addrs, Mode::Write)
    }

    fn acquire(&self, addrs: &[ScAddr], mode: Mode) -> MonitorGuard<'_> {
        let mut sorted: SmallVec<[ScAddr; 4]> =
            addrs.iter().copied().filter(|a| !a.is_empty()).collect();
        sorted.sort_unstable();
        sorted.dedup();
        debug_assert!(sorted.windows(2).all(|w| w[0] < w[1]));

        let mut held = SmallVec::new();
        for addr in sorted {
            let monitor = self.monitor(addr);
            let guard = match mode {
                Mode::Read => Held::Read(monitor.read_arc()),
                Mode::Write => Held::Write(monitor.write_arc()),
            };
            held.push((addr, guard));
        }
        MonitorGuard { table: self, held }
    }

    fn release(&self, addr: ScAddr) {
        let mut map = self.shard(addr).write();
        if map
            .get(&addr)
            .is_some_and(|monitor| Arc::strong_count(monitor) == 1)
        {
            map.remove(&addr);
        }
    }

    /// Drops every monitor nobody refers to; returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut map = shard.write();
            let before = map.len();
            map.retain(|_, monitor| Arc::strong_count(monitor) > 1);
            removed += before - map.len();
        }
        removed
    }

    /// Number of monitors currently materialized.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// True when no monitor is materialized.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MonitorTable {
    fn default() -> Self {
        Self::new(DEFAULT_MONITOR_SHARDS)
    }
}

impl MonitorGuard<'_> {
    /// Addresses covered by this guard, in acquisition order.
    pub fn addrs(&self) -> impl Iterator<Item = ScAddr> + '_ {
        self.held.iter().map(|(addr, _)| *addr)
    }

    /// True when the guard holds exclusive locks.
    pub fn is_exclusive(&self) -> bool {
        self.held
            .first()
            .is_some_and(|(_, held)| matches!(held, Held::Write(_)))
    }
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        while let Some((addr, guard)) = self.held.pop() {
            drop(guard);
            self.table.release(addr);
        }
    }
}
