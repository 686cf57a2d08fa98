//! Per-transaction staging lists.

use rustc_hash::FxHashSet;

use crate::types::{AccessLevels, ScAddr, ScType};

/// New version of the mutable fields of one element.
///
/// `None` leaves the field as it is in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElementSnapshot {
    /// Narrowed type.
    pub ty: Option<ScType>,
    /// Replacement access levels.
    pub access: Option<AccessLevels>,
}

/// Addresses created, modified and removed by one transaction, plus pending
/// link content.
///
/// The buffer holds addresses only; it never owns a slot.
#[derive(Debug, Default)]
pub struct TransactionBuffer {
    created: Vec<ScAddr>,
    created_set: FxHashSet<ScAddr>,
    modified: Vec<(ScAddr, ElementSnapshot)>,
    removed: Vec<ScAddr>,
    removed_set: FxHashSet<ScAddr>,
    content_changes: Vec<(ScAddr, Vec<u8>)>,
}

impl TransactionBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a created address; returns false if it was already recorded.
    pub fn record_created(&mut self, addr: ScAddr) -> bool {
        if !self.created_set.insert(addr) {
            return false;
        }
        self.created.push(addr);
        true
    }

    /// Stages `snapshot` for `addr`, replacing an earlier one.
    pub fn record_modified(&mut self, addr: ScAddr, snapshot: ElementSnapshot) {
        match self.modified.iter_mut().find(|(a, _)| *a == addr) {
            Some((_, staged)) => *staged = snapshot,
            None => self.modified.push((addr, snapshot)),
        }
    }

    /// Records a removed address and drops whatever was staged for it.
    pub fn record_removed(&mut self, addr: ScAddr) -> bool {
        self.modified.retain(|(a, _)| *a != addr);
        self.content_changes.retain(|(a, _)| *a != addr);
        if !self.removed_set.insert(addr) {
            return false;
        }
        self.removed.push(addr);
        true
    }

    /// Stages new content for a link, replacing earlier staged content.
    pub fn record_content(&mut self, addr: ScAddr, bytes: &[u8]) {
        match self.content_changes.iter_mut().find(|(a, _)| *a == addr) {
            Some((_, staged)) => *staged = bytes.to_vec(),
            None => self.content_changes.push((addr, bytes.to_vec())),
        }
    }

    /// Snapshot staged for `addr`.
    pub fn staged_snapshot(&self, addr: ScAddr) -> Option<ElementSnapshot> {
        self.modified
            .iter()
            .find(|(a, _)| *a == addr)
            .map(|(_, snapshot)| *snapshot)
    }

    /// Content staged for `addr`.
    pub fn staged_content(&self, addr: ScAddr) -> Option<&[u8]> {
        self.content_changes
            .iter()
            .find(|(a, _)| *a == addr)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// True when `addr` was erased inside this transaction.
    pub fn was_removed(&self, addr: ScAddr) -> bool {
        self.removed_set.contains(&addr)
    }

    /// Created addresses in creation order.
    pub fn created(&self) -> &[ScAddr] {
        &self.created
    }

    /// Staged snapshots in first-staged order.
    pub fn modified(&self) -> &[(ScAddr, ElementSnapshot)] {
        &self.modified
    }

    /// Removed addresses in removal order.
    pub fn removed(&self) -> &[ScAddr] {
        &self.removed
    }

    /// Staged link content.
    pub fn content_changes(&self) -> &[(ScAddr, Vec<u8>)] {
        &self.content_changes
    }

    /// Every address with staged state, sorted and deduplicated.
    pub fn staged_addrs(&self) -> Vec<ScAddr> {
        let mut addrs: Vec<ScAddr> = self
            .modified
            .iter()
            .map(|(a, _)| *a)
            .chain(self.content_changes.iter().map(|(a, _)| *a))
            .collect();
        addrs.sort_unstable();
        addrs.dedup();
        addrs
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
            && self.content_changes.is_empty()
    }

    /// Drops every list and releases their memory.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
